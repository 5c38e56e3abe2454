//! Resolution of the environment a run executes in.
//!
//! The environment selects the configuration file under `config/`, so
//! `ONTOSCOPE_ENV=production` loads `config/production.yaml`.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_variant::to_variant_name;

use crate::{config::Config, Result};

pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const ENV_VAR: &str = "ONTOSCOPE_ENV";

/// Returns the environment named by `ONTOSCOPE_ENV`, or the default one.
#[must_use]
pub fn resolve_from_env() -> String {
    std::env::var(ENV_VAR).unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    #[serde(rename = "production")]
    Production,
    #[serde(rename = "development")]
    Development,
    #[serde(rename = "test")]
    Test,
    Any(String),
}

impl Environment {
    /// Loads the configuration matching this environment from `config/`.
    ///
    /// # Errors
    /// Returns an error when no configuration file exists or it cannot be
    /// rendered or parsed.
    pub fn load(&self) -> Result<Config> {
        Config::new(self)
    }

    /// Loads the configuration matching this environment from `path`.
    ///
    /// # Errors
    /// Returns an error when no configuration file exists or it cannot be
    /// rendered or parsed.
    pub fn load_from_folder(&self, path: &std::path::Path) -> Result<Config> {
        Config::from_folder(self, path)
    }
}

impl From<String> for Environment {
    fn from(env: String) -> Self {
        Self::from_str(&env).unwrap_or(Self::Any(env))
    }
}

impl FromStr for Environment {
    type Err = &'static str;

    fn from_str(input: &str) -> std::result::Result<Self, Self::Err> {
        match input {
            "production" => Ok(Self::Production),
            "development" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            s => Ok(Self::Any(s.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any(s) => s.fmt(f),
            _ => to_variant_name(self).expect("only enum supported").fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_serde_names() {
        assert_eq!(Environment::Production.to_string(), "production");
        assert_eq!(Environment::Development.to_string(), "development");
        assert_eq!(Environment::Test.to_string(), "test");
        assert_eq!(Environment::Any("staging".into()).to_string(), "staging");
    }

    #[test]
    fn unknown_names_become_custom_environments() {
        assert_eq!(
            Environment::from("qa".to_string()),
            Environment::Any("qa".to_string())
        );
        assert_eq!(Environment::from("test".to_string()), Environment::Test);
    }
}
