//! Process local [`GraphStore`], used for dry runs and tests.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;

use super::{
    domain::{GraphEdge, GraphNode},
    store::{GraphSchema, GraphSession, GraphStore, StoreError},
};
use crate::ontology::Iri;

#[derive(Debug, Default)]
struct Partition {
    nodes: BTreeMap<Iri, String>,
    edges: BTreeMap<String, BTreeSet<(Iri, Iri)>>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    partitions: BTreeMap<String, Partition>,
    open_sessions: usize,
}

/// Graph kept in memory, partitioned by node label.
///
/// Clones share the same data. [`InMemoryGraphStore::with_schema`] returns a
/// view managing another label over the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraphStore {
    state: Arc<Mutex<InMemoryState>>,
    schema: GraphSchema,
}

impl InMemoryGraphStore {
    #[must_use]
    pub fn new(schema: GraphSchema) -> Self {
        Self {
            state: Arc::default(),
            schema,
        }
    }

    #[must_use]
    pub fn with_schema(&self, schema: GraphSchema) -> Self {
        Self {
            state: Arc::clone(&self.state),
            schema,
        }
    }

    fn guard(&self) -> MutexGuard<'_, InMemoryState> {
        self.state.lock().expect("in-memory graph store poisoned")
    }

    /// Nodes carrying the managed label, ordered by key.
    #[must_use]
    pub fn nodes(&self) -> Vec<GraphNode> {
        self.guard()
            .partitions
            .get(self.schema.label())
            .map(|partition| {
                partition
                    .nodes
                    .iter()
                    .map(|(key, label)| GraphNode {
                        key: key.clone(),
                        label: label.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Relationships of the managed type between managed nodes.
    #[must_use]
    pub fn edges(&self) -> Vec<GraphEdge> {
        self.guard()
            .partitions
            .get(self.schema.label())
            .and_then(|partition| partition.edges.get(self.schema.relationship()))
            .map(|edges| {
                edges
                    .iter()
                    .map(|(parent, child)| GraphEdge {
                        parent: parent.clone(),
                        child: child.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Sessions opened and not closed yet.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.guard().open_sessions
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn open_session(&self) -> Result<Box<dyn GraphSession>, StoreError> {
        self.guard().open_sessions += 1;
        Ok(Box::new(InMemorySession {
            store: self.clone(),
            closed: false,
        }))
    }

    fn describe(&self) -> String {
        format!("in-memory graph (label `{}`)", self.schema.label())
    }
}

struct InMemorySession {
    store: InMemoryGraphStore,
    closed: bool,
}

impl InMemorySession {
    fn partition<T>(
        &self,
        apply: impl FnOnce(&mut Partition, &GraphSchema) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        if self.closed {
            return Err(StoreError::SessionClosed);
        }
        let schema = &self.store.schema;
        let mut state = self.store.guard();
        let partition = state
            .partitions
            .entry(schema.label().to_string())
            .or_default();
        apply(partition, schema)
    }
}

#[async_trait]
impl GraphSession for InMemorySession {
    async fn clear_managed_state(&mut self) -> Result<usize, StoreError> {
        self.partition(|partition, _| {
            let removed = partition.nodes.len();
            *partition = Partition::default();
            Ok(removed)
        })
    }

    async fn upsert_node(&mut self, node: &GraphNode) -> Result<(), StoreError> {
        self.partition(|partition, _| {
            partition.nodes.insert(node.key.clone(), node.label.clone());
            Ok(())
        })
    }

    async fn upsert_edge(&mut self, edge: &GraphEdge) -> Result<(), StoreError> {
        self.partition(|partition, schema| {
            if !partition.nodes.contains_key(&edge.parent)
                || !partition.nodes.contains_key(&edge.child)
            {
                return Err(StoreError::MissingEndpoint {
                    parent: edge.parent.clone(),
                    child: edge.child.clone(),
                });
            }
            partition
                .edges
                .entry(schema.relationship().to_string())
                .or_default()
                .insert((edge.parent.clone(), edge.child.clone()));
            Ok(())
        })
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::SessionClosed);
        }
        self.closed = true;
        let mut state = self.store.guard();
        state.open_sessions = state.open_sessions.saturating_sub(1);
        Ok(())
    }
}
