//! # Configuration
//!
//! Configuration is read from `config/<environment>.yaml`. A sibling
//! `<environment>.local.yaml` takes precedence when present, which keeps
//! credentials out of version control.
//!
//! Files are rendered with [`tera`] before parsing, so any value can be pulled
//! from the process environment:
//!
//! ```yaml
//! graph:
//!   password: {{ get_env(name="NEO4J_PASSWORD", default="neo4j") }}
//! ```
use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{environment::Environment, logger, query::LabelPattern, Error, Result};

static DEFAULT_FOLDER: OnceLock<PathBuf> = OnceLock::new();

fn get_default_folder() -> &'static PathBuf {
    DEFAULT_FOLDER.get_or_init(|| PathBuf::from("config"))
}

/// Namespace of the DigitRubber ontology, the reference audit target.
pub const DEFAULT_NAMESPACE: &str = "https://www.tib.eu/digitrubber#";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub logger: Logger,
    pub ontology: OntologySettings,
    #[serde(default)]
    pub query: QuerySettings,
    #[serde(default)]
    pub graph: GraphSettings,
    #[serde(default)]
    pub report: ReportSettings,
}

/// Logger configuration
///
/// Example (development):
/// ```yaml
/// logger:
///   enable: true
///   pretty_backtrace: true
///   level: debug
///   format: compact
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Logger {
    /// Enable log write to stdout
    pub enable: bool,

    /// Enable nice display of backtraces, in development this should be on.
    #[serde(default)]
    pub pretty_backtrace: bool,

    /// Set the logger level.
    pub level: logger::LogLevel,

    /// Set the logger format.
    #[serde(default)]
    pub format: logger::Format,

    /// Override our custom tracing filter.
    ///
    /// Set this to your own filter if you want to see traces from internal
    /// libraries. See more [here](https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html#directives)
    pub override_filter: Option<String>,

    /// Set this if you want to write log to file
    pub file_appender: Option<LoggerFileAppender>,
}

impl Default for Logger {
    fn default() -> Self {
        Self {
            enable: true,
            pretty_backtrace: false,
            level: logger::LogLevel::Info,
            format: logger::Format::Compact,
            override_filter: None,
            file_appender: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggerFileAppender {
    /// Enable logger file appender
    pub enable: bool,

    /// Enable write log to file non-blocking
    #[serde(default)]
    pub non_blocking: bool,

    /// Set the logger file appender level.
    pub level: logger::LogLevel,

    /// Set the logger file appender format.
    #[serde(default)]
    pub format: logger::Format,

    /// Set the logger file appender rotation.
    #[serde(default)]
    pub rotation: logger::Rotation,

    /// Set the logger file appender dir
    ///
    /// default is `./logs`
    pub dir: Option<String>,

    /// Set log filename prefix
    pub filename_prefix: Option<String>,

    /// Set log filename suffix
    pub filename_suffix: Option<String>,

    /// Set the logger file appender keep max log files.
    pub max_log_files: usize,
}

/// Where the ontology comes from and which namespace counts as local.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OntologySettings {
    pub source: PathBuf,

    /// Forces a serialization instead of guessing it from the file extension.
    #[serde(default)]
    pub format: Option<crate::ontology::loader::SourceFormat>,

    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Label pattern applied by the query step.
///
/// ```yaml
/// query:
///   pattern:
///     kind: contains
///     term: rubber
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QuerySettings {
    #[serde(default)]
    pub pattern: LabelPattern,
}

/// Neo4j connection and projection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphSettings {
    /// Skip the synchronization step entirely when disabled.
    #[serde(default = "default_true")]
    pub enable: bool,

    #[serde(default = "default_uri")]
    pub uri: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_user")]
    pub password: String,

    /// Label of the nodes owned by the synchronizer.
    #[serde(default = "default_label")]
    pub label: String,

    /// Relationship type drawn from a parent class to its subclass.
    #[serde(default = "default_relationship")]
    pub relationship: String,

    /// Bound applied to every store operation, in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Restrict the projection to classes of the configured namespace.
    #[serde(default = "default_true")]
    pub local_only: bool,

    /// Where the projected graph can be browsed.
    #[serde(default = "default_browser_url")]
    pub browser_url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl GraphSettings {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            enable: true,
            uri: default_uri(),
            user: default_user(),
            password: default_user(),
            label: default_label(),
            relationship: default_relationship(),
            timeout: default_timeout(),
            local_only: true,
            browser_url: default_browser_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_label() -> String {
    "Class".to_string()
}

fn default_relationship() -> String {
    "HAS_SUBCLASS".to_string()
}

fn default_timeout() -> u64 {
    10_000
}

fn default_browser_url() -> String {
    "http://localhost:7474".to_string()
}

fn default_max_connections() -> usize {
    4
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportSettings {
    #[serde(default = "default_report_path")]
    pub path: PathBuf,

    #[serde(default = "default_report_title")]
    pub title: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            path: default_report_path(),
            title: default_report_title(),
        }
    }
}

fn default_report_path() -> PathBuf {
    PathBuf::from("ontology_overview.md")
}

fn default_report_title() -> String {
    "Ontology Overview".to_string()
}

impl Config {
    /// Loads the configuration of `env` from the default `config/` folder.
    ///
    /// # Errors
    /// Returns an error when no configuration file exists or it cannot be
    /// rendered or parsed.
    pub fn new(env: &Environment) -> Result<Self> {
        Self::from_folder(env, get_default_folder().as_path())
    }

    /// Loads the configuration of `env` from `path`.
    ///
    /// # Errors
    /// Returns an error when no configuration file exists or it cannot be
    /// rendered or parsed.
    pub fn from_folder(env: &Environment, path: &Path) -> Result<Self> {
        let files = [
            path.join(format!("{env}.local.yaml")),
            path.join(format!("{env}.yaml")),
        ];

        let selected_path = files
            .iter()
            .find(|p| p.exists())
            .ok_or_else(|| Error::ConfigNotFound {
                folder: path.to_path_buf(),
                environment: env.to_string(),
            })?;

        info!(selected_path =? selected_path, "loading environment from");

        let content = fs::read_to_string(selected_path)?;
        Self::from_template(&content, &selected_path.to_string_lossy())
    }

    /// Renders `content` with tera and parses the result.
    ///
    /// # Errors
    /// Returns an error when the template or the YAML is invalid.
    pub fn from_template(content: &str, origin: &str) -> Result<Self> {
        let rendered = tera::Tera::one_off(content, &tera::Context::new(), false)?;
        serde_yaml::from_str(&rendered).map_err(|err| Error::YAMLFile(err, origin.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::LabelPattern;

    const MINIMAL: &str = r"
logger:
  enable: false
  level: info
ontology:
  source: digitrubber-full.owl
";

    #[test]
    fn applies_defaults_for_optional_sections() {
        let config = Config::from_template(MINIMAL, "inline").expect("valid config");

        assert_eq!(config.ontology.namespace, DEFAULT_NAMESPACE);
        assert!(config.ontology.format.is_none());
        assert_eq!(config.graph.uri, "bolt://localhost:7687");
        assert_eq!(config.graph.label, "Class");
        assert_eq!(config.graph.relationship, "HAS_SUBCLASS");
        assert_eq!(config.graph.timeout(), Duration::from_secs(10));
        assert!(config.graph.local_only);
        assert_eq!(config.report.path, PathBuf::from("ontology_overview.md"));
        assert!(matches!(
            config.query.pattern,
            LabelPattern::Contains { ref term, case_sensitive: false } if term == "rubber"
        ));
    }

    #[test]
    fn renders_environment_variables() {
        std::env::set_var("ONTOSCOPE_TEST_GRAPH_USER", "auditor");
        let content = format!(
            "{MINIMAL}graph:\n  user: {{{{ get_env(name=\"ONTOSCOPE_TEST_GRAPH_USER\", default=\"neo4j\") }}}}\n"
        );

        let config = Config::from_template(&content, "inline").expect("valid config");

        assert_eq!(config.graph.user, "auditor");
    }

    #[test]
    fn reports_the_offending_file_on_yaml_errors() {
        let err = Config::from_template("logger: [", "config/broken.yaml").expect_err("invalid");
        assert!(matches!(err, Error::YAMLFile(_, ref origin) if origin == "config/broken.yaml"));
        assert!(err.to_string().contains("config/broken.yaml"));
    }

    #[test]
    fn missing_folder_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Config::from_folder(&Environment::Test, dir.path()).expect_err("no config");
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    fn local_file_takes_precedence() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("test.yaml"), MINIMAL).expect("write");
        fs::write(
            dir.path().join("test.local.yaml"),
            MINIMAL.replace("digitrubber-full.owl", "local.ttl"),
        )
        .expect("write");

        let config = Config::from_folder(&Environment::Test, dir.path()).expect("config");

        assert_eq!(config.ontology.source, PathBuf::from("local.ttl"));
    }
}
