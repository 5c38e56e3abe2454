use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use ontoscope::{
    config::Config,
    environment::Environment,
    graph::{GraphEdge, GraphNode, GraphSession, GraphStore, InMemoryGraphStore, StoreError},
    ontology::LoadError,
    report::ReportWriter,
    workflow::{GraphOutcome, RunStatus, Workflow},
    Error,
};

const FIXTURE: &str = "tests/fixtures/digitrubber.ttl";

fn config(extra: &str) -> Config {
    let content = format!(
        "logger:\n  enable: false\n  level: info\nontology:\n  source: {FIXTURE}\n{extra}"
    );
    Config::from_template(&content, "inline").expect("valid config")
}

struct UnreachableStore;

#[async_trait]
impl GraphStore for UnreachableStore {
    async fn open_session(&self) -> Result<Box<dyn GraphSession>, StoreError> {
        Err(StoreError::Unreachable("connection refused".to_string()))
    }

    fn describe(&self) -> String {
        "bolt://localhost:7687".to_string()
    }
}

/// Opens sessions whose reset is rejected.
#[derive(Default)]
struct RejectingResetStore {
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl GraphStore for RejectingResetStore {
    async fn open_session(&self) -> Result<Box<dyn GraphSession>, StoreError> {
        Ok(Box::new(RejectingResetSession {
            closed: Arc::clone(&self.closed),
        }))
    }

    fn describe(&self) -> String {
        "bolt://localhost:7687".to_string()
    }
}

struct RejectingResetSession {
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl GraphSession for RejectingResetSession {
    async fn clear_managed_state(&mut self) -> Result<usize, StoreError> {
        Err(StoreError::Unauthorized("authentication failure".to_string()))
    }

    async fn upsert_node(&mut self, _node: &GraphNode) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert_edge(&mut self, _edge: &GraphEdge) -> Result<(), StoreError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_environment_config_runs_end_to_end() {
    let config = Environment::Test.load().expect("config/test.yaml");
    let store = InMemoryGraphStore::default();

    let outcome = Workflow::new(&config)
        .run_with_store(&store)
        .await
        .expect("run");

    assert_eq!(outcome.status, RunStatus::Complete);
    assert_eq!(outcome.metrics.class_count, 5);
    assert_eq!(outcome.metrics.local_class_count, 4);
    assert_eq!(outcome.metrics.subclass_relationship_count, 4);
    assert_eq!(outcome.metrics.property_assertion_count, 4);
    assert_eq!(outcome.metrics.approximate_axiom_count, 16);
    assert_eq!(store.nodes().len(), 4);
    assert_eq!(store.edges().len(), 3);
}

#[tokio::test]
async fn unreachable_store_degrades_the_run() {
    let config = config("");
    let outcome = Workflow::new(&config)
        .run_with_store(&UnreachableStore)
        .await
        .expect("run is not aborted");

    assert!(outcome.status.is_degraded());
    assert!(matches!(outcome.graph, GraphOutcome::Failed { .. }));
    assert_eq!(outcome.metrics.class_count, 5);
    assert_eq!(outcome.matches.len(), 2);
}

#[tokio::test]
async fn failed_reset_keeps_metrics_and_matches() {
    let config = config("");
    let store = RejectingResetStore::default();

    let outcome = Workflow::new(&config)
        .run_with_store(&store)
        .await
        .expect("run is not aborted");

    assert!(outcome.status.is_degraded());
    assert!(matches!(
        outcome.graph,
        GraphOutcome::Failed { ref reason, .. } if reason.contains("authentication failure")
    ));
    assert_eq!(outcome.metrics.class_count, 5);
    assert_eq!(outcome.matches.len(), 2);
    assert_eq!(store.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn malformed_pattern_yields_an_empty_result() {
    let config = config("query:\n  pattern:\n    kind: regex\n    pattern: \"(rubber\"\n");
    let outcome = Workflow::new(&config)
        .run_with_store(&InMemoryGraphStore::default())
        .await
        .expect("run");

    assert!(outcome.matches.is_empty());
    assert!(outcome.query_warning.is_some());
    assert_eq!(outcome.status, RunStatus::Complete);
    assert!(matches!(outcome.graph, GraphOutcome::Synchronized { .. }));
}

#[tokio::test]
async fn missing_ontology_is_fatal() {
    let config = Config::from_template(
        "logger:\n  enable: false\n  level: info\nontology:\n  source: tests/fixtures/missing.owl\n",
        "inline",
    )
    .expect("valid config");

    let err = Workflow::new(&config)
        .run_with_store(&InMemoryGraphStore::default())
        .await
        .expect_err("load fails");

    assert!(matches!(err, Error::Load(LoadError::NotFound { .. })));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn invalid_relationship_degrades_instead_of_aborting() {
    let config = config("graph:\n  relationship: \"HAS SUBCLASS\"\n");
    let outcome = Workflow::new(&config)
        .dry_run(true)
        .run()
        .await
        .expect("run");

    assert!(outcome.status.is_degraded());
    assert_eq!(outcome.metrics.class_count, 5);
}

#[tokio::test]
async fn disabled_graph_skips_synchronization() {
    let config = config("graph:\n  enable: false\n");
    let store = InMemoryGraphStore::default();
    let outcome = Workflow::new(&config)
        .run_with_store(&store)
        .await
        .expect("run");

    assert_eq!(outcome.graph, GraphOutcome::Disabled);
    assert_eq!(store.open_sessions(), 0);
    assert!(store.nodes().is_empty());
}

#[tokio::test]
async fn report_combines_metrics_matches_and_graph() {
    let config = config("report:\n  title: DigitRubber Ontology Overview\n");
    let outcome = Workflow::new(&config)
        .run_with_store(&InMemoryGraphStore::default())
        .await
        .expect("run");

    let markdown = ReportWriter::new(&config.report.title)
        .render(&outcome)
        .expect("render");

    insta::assert_snapshot!(markdown.trim_end(), @r###"
    # DigitRubber Ontology Overview

    Ontology: `https://www.tib.eu/digitrubber`

    ## Summary Metrics

    | Metric | Value |
    | --- | ---: |
    | Number of Classes | 5 |
    | Number of Local Classes | 4 |
    | Number of Object Properties | 1 |
    | Number of Data Properties | 1 |
    | Number of Individuals | 1 |
    | Number of Axioms (Approx) | 16 |
    | Number of Rules (SWRL) | 0 |
    | Number of Subclass Relationships | 4 |

    ## Pattern Results

    Pattern: label contains "rubber" (case-insensitive)

    | Class | Label |
    | --- | --- |
    | https://www.tib.eu/digitrubber#NaturalRubber | natural rubber |
    | https://www.tib.eu/digitrubber#RubberCompound | Rubber Compound |

    ## Class Hierarchy Graph

    Loaded 4 classes and 3 subclass relationships into in-memory graph (label `Class`).

    To visualize, open http://localhost:7474 and run:

    ```cypher
    MATCH (n:Class)-[:HAS_SUBCLASS]->(m:Class) RETURN n, m
    ```
    "###);
}

#[tokio::test]
async fn degraded_report_names_the_failure() {
    let config = config("");
    let outcome = Workflow::new(&config)
        .run_with_store(&UnreachableStore)
        .await
        .expect("run");

    let markdown = ReportWriter::new("Overview").render(&outcome).expect("render");

    assert!(markdown.contains("| Number of Classes | 5 |"));
    assert!(markdown.contains(
        "Synchronization with bolt://localhost:7687 failed, the run is degraded: graph store is \
         unreachable: connection refused"
    ));
}
