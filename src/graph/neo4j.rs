//! [`GraphStore`] backed by Neo4j over Bolt.

use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph};
use tracing::debug;

use super::{
    domain::{GraphEdge, GraphNode},
    store::{GraphSchema, GraphSession, GraphStore, StoreError},
};
use crate::config::GraphSettings;

pub struct Neo4jGraphStore {
    uri: String,
    user: String,
    password: String,
    max_connections: usize,
    schema: GraphSchema,
}

impl Neo4jGraphStore {
    /// Prepares a store from settings. No connection is made until a
    /// session is opened.
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidIdentifier`] when the configured label or
    /// relationship cannot be used in a Cypher statement.
    pub fn from_settings(settings: &GraphSettings) -> Result<Self, StoreError> {
        Ok(Self {
            uri: settings.uri.clone(),
            user: settings.user.clone(),
            password: settings.password.clone(),
            max_connections: settings.max_connections.max(1),
            schema: GraphSchema::new(&settings.label, &settings.relationship)?,
        })
    }
}

/// Deletes the managed nodes and their relationships, returning how many
/// nodes went away.
fn reset_statement(schema: &GraphSchema) -> String {
    format!(
        "MATCH (n:{label}) DETACH DELETE n RETURN count(n) AS removed",
        label = schema.label()
    )
}

fn node_statement(schema: &GraphSchema) -> String {
    format!(
        "MERGE (c:{label} {{iri: $iri}}) SET c.label = $label",
        label = schema.label()
    )
}

/// Yields no row when either endpoint is missing.
fn edge_statement(schema: &GraphSchema) -> String {
    format!(
        "MATCH (p:{label} {{iri: $parent}}) MATCH (c:{label} {{iri: $child}}) MERGE \
         (p)-[:{rel}]->(c) RETURN count(*) AS linked",
        label = schema.label(),
        rel = schema.relationship()
    )
}

fn store_error(err: neo4rs::Error) -> StoreError {
    let message = err.to_string();
    match err {
        neo4rs::Error::AuthenticationError { .. } => StoreError::Unauthorized(message),
        neo4rs::Error::ConnectionError { .. } | neo4rs::Error::IOError { .. } => {
            StoreError::Unreachable(message)
        }
        _ => StoreError::Backend(message),
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn open_session(&self) -> Result<Box<dyn GraphSession>, StoreError> {
        let config = ConfigBuilder::default()
            .uri(self.uri.as_str())
            .user(self.user.as_str())
            .password(self.password.as_str())
            .max_connections(self.max_connections)
            .build()
            .map_err(store_error)?;
        let graph = Graph::connect(config).await.map_err(store_error)?;
        debug!(uri = %self.uri, "connected to neo4j");

        Ok(Box::new(Neo4jSession {
            graph: Some(graph),
            schema: self.schema.clone(),
        }))
    }

    fn describe(&self) -> String {
        self.uri.clone()
    }
}

struct Neo4jSession {
    graph: Option<Graph>,
    schema: GraphSchema,
}

impl Neo4jSession {
    fn graph(&self) -> Result<&Graph, StoreError> {
        self.graph.as_ref().ok_or(StoreError::SessionClosed)
    }
}

#[async_trait]
impl GraphSession for Neo4jSession {
    async fn clear_managed_state(&mut self) -> Result<usize, StoreError> {
        let statement = reset_statement(&self.schema);
        let graph = self.graph()?;

        let mut txn = graph.start_txn().await.map_err(store_error)?;
        let mut rows = txn
            .execute(query(&statement))
            .await
            .map_err(|err| StoreError::Transaction(err.to_string()))?;
        let mut removed: i64 = 0;
        while let Some(row) = rows
            .next(txn.handle())
            .await
            .map_err(|err| StoreError::Transaction(err.to_string()))?
        {
            removed = row
                .get("removed")
                .map_err(|err| StoreError::Backend(err.to_string()))?;
        }
        txn.commit()
            .await
            .map_err(|err| StoreError::Transaction(err.to_string()))?;

        Ok(usize::try_from(removed).unwrap_or_default())
    }

    async fn upsert_node(&mut self, node: &GraphNode) -> Result<(), StoreError> {
        let statement = node_statement(&self.schema);
        self.graph()?
            .run(
                query(&statement)
                    .param("iri", node.key.as_str())
                    .param("label", node.label.as_str()),
            )
            .await
            .map_err(store_error)
    }

    async fn upsert_edge(&mut self, edge: &GraphEdge) -> Result<(), StoreError> {
        let statement = edge_statement(&self.schema);
        let mut rows = self
            .graph()?
            .execute(
                query(&statement)
                    .param("parent", edge.parent.as_str())
                    .param("child", edge.child.as_str()),
            )
            .await
            .map_err(store_error)?;

        let linked: i64 = match rows.next().await.map_err(store_error)? {
            Some(row) => row
                .get("linked")
                .map_err(|err| StoreError::Backend(err.to_string()))?,
            None => 0,
        };
        if linked == 0 {
            return Err(StoreError::MissingEndpoint {
                parent: edge.parent.clone(),
                child: edge.child.clone(),
            });
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.graph
            .take()
            .map(drop)
            .ok_or(StoreError::SessionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> GraphSchema {
        GraphSchema::new("Concept", "NARROWER").expect("valid schema")
    }

    #[test]
    fn statements_use_the_managed_schema() {
        assert_eq!(
            reset_statement(&schema()),
            "MATCH (n:Concept) DETACH DELETE n RETURN count(n) AS removed"
        );
        assert_eq!(
            node_statement(&schema()),
            "MERGE (c:Concept {iri: $iri}) SET c.label = $label"
        );
        assert_eq!(
            edge_statement(&schema()),
            "MATCH (p:Concept {iri: $parent}) MATCH (c:Concept {iri: $child}) MERGE \
             (p)-[:NARROWER]->(c) RETURN count(*) AS linked"
        );
    }

    #[test]
    fn rejected_credentials_are_unauthorized() {
        let err = store_error(neo4rs::Error::AuthenticationError(
            "invalid credentials".to_string(),
        ));
        assert!(matches!(err, StoreError::Unauthorized(_)));
    }

    #[test]
    fn connection_failures_are_unreachable() {
        assert!(matches!(
            store_error(neo4rs::Error::ConnectionError),
            StoreError::Unreachable(_)
        ));

        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(
            store_error(neo4rs::Error::from(refused)),
            StoreError::Unreachable(_)
        ));
    }

    #[test]
    fn invalid_schema_is_rejected_before_connecting() {
        let settings = GraphSettings {
            label: "Class; DROP".to_string(),
            ..GraphSettings::default()
        };
        assert!(matches!(
            Neo4jGraphStore::from_settings(&settings),
            Err(StoreError::InvalidIdentifier(_))
        ));
    }
}
