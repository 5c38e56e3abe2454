//! # Application Error Handling

use std::path::PathBuf;

use crate::{graph::store::StoreError, ontology::loader::LoadError, query::QueryError};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cannot parse `{1}`: {0}")]
    YAMLFile(#[source] serde_yaml::Error, String),

    #[error(transparent)]
    JSON(#[from] serde_json::Error),

    #[error(transparent)]
    Tera(#[from] tera::Error),

    #[error("no configuration file found in `{}` for environment `{environment}`", folder.display())]
    ConfigNotFound { folder: PathBuf, environment: String },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

impl Error {
    /// Whether the error must abort the whole run.
    ///
    /// Query and store failures are recovered by the workflow; everything
    /// else, including a failed ontology load, is fatal.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Query(_) | Self::Store(_))
    }
}
