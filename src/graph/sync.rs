//! Projection of the selected class hierarchy into a [`GraphStore`].
//!
//! A run opens one session and performs, in order: a scoped reset of the
//! managed state, one upsert per selected class, then one upsert per direct
//! subclass pair whose endpoints are both selected. Every store call is
//! bounded by the synchronizer's timeout. The session is closed on every
//! exit path; a failed step leaves earlier writes in place.

use std::{future::Future, time::Duration};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{
    domain::{ClassFilter, GraphProjection},
    store::{GraphSession, GraphStore, StoreError},
};
use crate::ontology::OntologyModel;

/// Non-fatal conditions met while synchronizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncWarning {
    /// The filter selected no class. The store was still reset.
    EmptySelection {
        total_classes: usize,
        local_classes: usize,
    },
}

impl std::fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySelection {
                total_classes,
                local_classes,
            } => write!(
                f,
                "no classes selected for synchronization (total classes: {total_classes}, local \
                 classes: {local_classes})"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub nodes_written: usize,
    pub edges_written: usize,
    pub warnings: Vec<SyncWarning>,
}

#[derive(Debug, Clone, Copy)]
pub struct GraphSynchronizer {
    timeout: Duration,
}

impl Default for GraphSynchronizer {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

async fn bounded<T, F>(operation: &'static str, after: Duration, future: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>> + Send,
{
    tokio::time::timeout(after, future)
        .await
        .map_err(|_| StoreError::Timeout { operation, after })?
}

impl GraphSynchronizer {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Synchronizes the classes accepted by `filter` into `store`.
    ///
    /// # Errors
    /// Returns the first [`StoreError`] met. Writes made before the failure
    /// are not rolled back.
    pub async fn synchronize<F>(
        &self,
        model: &OntologyModel,
        filter: &F,
        store: &dyn GraphStore,
    ) -> Result<SyncResult, StoreError>
    where
        F: ClassFilter + ?Sized,
    {
        let projection = GraphProjection::build(model, filter);
        debug!(
            nodes = projection.nodes.len(),
            edges = projection.edges.len(),
            store = %store.describe(),
            timeout = ?self.timeout,
            "projected class hierarchy"
        );

        let mut session = bounded("open session", self.timeout, store.open_session()).await?;
        let outcome = self.write(session.as_mut(), &projection).await;
        let closed = bounded("close session", self.timeout, session.close()).await;

        let (nodes_written, edges_written) = outcome?;
        closed?;

        let mut warnings = Vec::new();
        if projection.is_empty() {
            let warning = SyncWarning::EmptySelection {
                total_classes: model.class_count(),
                local_classes: model.local_classes().count(),
            };
            warn!(
                total = model.class_count(),
                local = model.local_classes().count(),
                "no classes selected for synchronization"
            );
            warnings.push(warning);
        }

        info!(nodes_written, edges_written, "graph synchronized");
        Ok(SyncResult {
            nodes_written,
            edges_written,
            warnings,
        })
    }

    async fn write(
        &self,
        session: &mut dyn GraphSession,
        projection: &GraphProjection,
    ) -> Result<(usize, usize), StoreError> {
        let removed = bounded("reset", self.timeout, session.clear_managed_state()).await?;
        debug!(removed, "cleared managed graph state");

        let mut nodes_written = 0;
        for node in &projection.nodes {
            bounded("upsert node", self.timeout, session.upsert_node(node)).await?;
            nodes_written += 1;
        }

        let mut edges_written = 0;
        for edge in &projection.edges {
            bounded("upsert edge", self.timeout, session.upsert_edge(edge)).await?;
            edges_written += 1;
        }

        Ok((nodes_written, edges_written))
    }
}
