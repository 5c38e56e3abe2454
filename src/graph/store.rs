//! Ports towards the property graph the class hierarchy is projected into.
//!
//! A [`GraphStore`] hands out [`GraphSession`]s. Every write a session
//! performs is idempotent: repeating the same call leaves the store as it
//! was after the first one.

use std::{sync::OnceLock, time::Duration};

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

use super::domain::{GraphEdge, GraphNode};
use crate::ontology::Iri;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("graph store is unreachable: {0}")]
    Unreachable(String),

    #[error("graph store rejected the credentials: {0}")]
    Unauthorized(String),

    #[error("`{operation}` did not complete within {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("transaction failed: {0}")]
    Transaction(String),

    #[error("cannot link `{parent}` to `{child}`: endpoint node is missing")]
    MissingEndpoint { parent: Iri, child: Iri },

    #[error("`{0}` is not a valid label or relationship type")]
    InvalidIdentifier(String),

    #[error("session is already closed")]
    SessionClosed,

    #[error("graph store error: {0}")]
    Backend(String),
}

/// Label and relationship type owned by the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSchema {
    label: String,
    relationship: String,
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"))
}

impl GraphSchema {
    /// # Errors
    /// Returns [`StoreError::InvalidIdentifier`] when either name is not a
    /// plain identifier.
    pub fn new(
        label: impl Into<String>,
        relationship: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let label = label.into();
        let relationship = relationship.into();
        for name in [&label, &relationship] {
            if !identifier_pattern().is_match(name) {
                return Err(StoreError::InvalidIdentifier(name.clone()));
            }
        }
        Ok(Self {
            label,
            relationship,
        })
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn relationship(&self) -> &str {
        &self.relationship
    }

    /// Cypher statement that shows the projected hierarchy in a browser.
    #[must_use]
    pub fn browse_query(&self) -> String {
        format!(
            "MATCH (n:{label})-[:{rel}]->(m:{label}) RETURN n, m",
            label = self.label,
            rel = self.relationship
        )
    }
}

impl Default for GraphSchema {
    fn default() -> Self {
        Self {
            label: "Class".to_string(),
            relationship: "HAS_SUBCLASS".to_string(),
        }
    }
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Opens a session. The caller must [`GraphSession::close`] it on every
    /// exit path.
    async fn open_session(&self) -> Result<Box<dyn GraphSession>, StoreError>;

    /// Human readable location of the store, used in logs and reports.
    fn describe(&self) -> String;
}

#[async_trait]
pub trait GraphSession: Send {
    /// Deletes every node carrying the managed label together with its
    /// relationships. Data outside the managed label is left untouched.
    /// Returns the number of removed nodes.
    async fn clear_managed_state(&mut self) -> Result<usize, StoreError>;

    /// Creates the node keyed by `node.key`, or updates its label.
    async fn upsert_node(&mut self, node: &GraphNode) -> Result<(), StoreError>;

    /// Creates the relationship for the ordered pair unless it exists.
    ///
    /// Both endpoint nodes must have been upserted before.
    async fn upsert_edge(&mut self, edge: &GraphEdge) -> Result<(), StoreError>;

    /// Releases the session. Further calls fail with
    /// [`StoreError::SessionClosed`].
    async fn close(&mut self) -> Result<(), StoreError>;
}
