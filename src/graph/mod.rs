pub mod domain;
pub mod memory;
#[cfg(feature = "neo4j")]
pub mod neo4j;
pub mod store;
pub mod sync;

pub use domain::{AllClasses, ClassFilter, GraphEdge, GraphNode, GraphProjection, LocalNamespace};
pub use memory::InMemoryGraphStore;
#[cfg(feature = "neo4j")]
pub use neo4j::Neo4jGraphStore;
pub use store::{GraphSchema, GraphSession, GraphStore, StoreError};
pub use sync::{GraphSynchronizer, SyncResult, SyncWarning};
