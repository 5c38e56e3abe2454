use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use ontoscope::{
    graph::{
        AllClasses, GraphEdge, GraphNode, GraphSession, GraphStore, GraphSynchronizer,
        InMemoryGraphStore, LocalNamespace, StoreError, SyncWarning,
    },
    ontology::{Class, Iri, Namespace, Ontology, OntologyModel},
};
use rstest::rstest;

const NS: &str = "https://example.org/onto#";

fn iri(name: &str) -> Iri {
    Iri::new(format!("{NS}{name}")).expect("valid iri")
}

fn model(classes: &[(&str, &str)]) -> OntologyModel {
    let mut ontology = Ontology::new(Iri::new("https://example.org/onto").expect("iri"));
    for (name, parents) in classes {
        let mut class = Class::new(iri(name));
        for parent in parents.split_whitespace() {
            class.add_parent(iri(parent));
        }
        ontology.add_class(class).expect("unique class");
    }
    OntologyModel::new(ontology, Namespace::new(NS))
}

fn diamond() -> OntologyModel {
    model(&[("A", ""), ("B", "A"), ("C", "A"), ("D", "B C")])
}

#[tokio::test]
async fn diamond_inheritance_yields_four_edges() {
    let store = InMemoryGraphStore::default();
    let result = GraphSynchronizer::default()
        .synchronize(&diamond(), &AllClasses, &store)
        .await
        .expect("sync");

    assert_eq!(result.nodes_written, 4);
    assert_eq!(result.edges_written, 4);

    let pairs: Vec<(String, String)> = store
        .edges()
        .into_iter()
        .map(|edge| {
            (
                edge.parent.local_name().to_string(),
                edge.child.local_name().to_string(),
            )
        })
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("A".to_string(), "B".to_string()),
            ("A".to_string(), "C".to_string()),
            ("B".to_string(), "D".to_string()),
            ("C".to_string(), "D".to_string()),
        ]
    );
}

#[tokio::test]
async fn excluded_parents_leave_no_edges() {
    let model = model(&[("X", "Y"), ("Y", "")]);
    let store = InMemoryGraphStore::default();
    let only_x = |class: &Class| class.id() == &iri("X");

    let result = GraphSynchronizer::default()
        .synchronize(&model, &only_x, &store)
        .await
        .expect("sync");

    assert_eq!(result.nodes_written, 1);
    assert_eq!(result.edges_written, 0);
    assert_eq!(store.nodes().len(), 1);
    assert!(store
        .edges()
        .iter()
        .all(|edge| edge.parent != iri("Y") && edge.child != iri("Y")));
}

#[tokio::test]
async fn repeated_runs_are_idempotent() {
    let model = diamond();
    let store = InMemoryGraphStore::default();
    let synchronizer = GraphSynchronizer::default();

    let first = synchronizer
        .synchronize(&model, &AllClasses, &store)
        .await
        .expect("first sync");
    let nodes = store.nodes();
    let edges = store.edges();

    let second = synchronizer
        .synchronize(&model, &AllClasses, &store)
        .await
        .expect("second sync");

    assert_eq!(first, second);
    assert_eq!(store.nodes(), nodes);
    assert_eq!(store.edges(), edges);
}

#[tokio::test]
async fn imported_classes_are_skipped_by_the_local_filter() {
    let mut ontology = Ontology::new(Iri::new("https://example.org/onto").expect("iri"));
    let mut local = Class::new(iri("Local"));
    local.add_parent(Iri::new("http://purl.obolibrary.org/obo/BFO_0000001").expect("iri"));
    ontology.add_class(local).expect("class");
    ontology
        .add_class(Class::new(
            Iri::new("http://purl.obolibrary.org/obo/BFO_0000001").expect("iri"),
        ))
        .expect("class");
    let model = OntologyModel::new(ontology, Namespace::new(NS));

    let store = InMemoryGraphStore::default();
    let result = GraphSynchronizer::default()
        .synchronize(&model, &LocalNamespace, &store)
        .await
        .expect("sync");

    assert_eq!((result.nodes_written, result.edges_written), (1, 0));
}

#[tokio::test]
async fn empty_selection_is_a_warning() {
    let store = InMemoryGraphStore::default();
    let result = GraphSynchronizer::default()
        .synchronize(&diamond(), &|_: &Class| false, &store)
        .await
        .expect("sync");

    assert_eq!((result.nodes_written, result.edges_written), (0, 0));
    assert_eq!(
        result.warnings,
        vec![SyncWarning::EmptySelection {
            total_classes: 4,
            local_classes: 4,
        }]
    );
}

#[derive(Clone, Copy, Debug)]
enum Fault {
    Open,
    Reset,
    Edge,
    Stall,
}

struct FaultyStore {
    fault: Fault,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl GraphStore for FaultyStore {
    async fn open_session(&self) -> Result<Box<dyn GraphSession>, StoreError> {
        if let Fault::Open = self.fault {
            return Err(StoreError::Unreachable("connection refused".to_string()));
        }
        Ok(Box::new(FaultySession {
            fault: self.fault,
            closed: Arc::clone(&self.closed),
        }))
    }

    fn describe(&self) -> String {
        "faulty".to_string()
    }
}

struct FaultySession {
    fault: Fault,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl GraphSession for FaultySession {
    async fn clear_managed_state(&mut self) -> Result<usize, StoreError> {
        match self.fault {
            Fault::Reset => Err(StoreError::Unauthorized("bad credentials".to_string())),
            Fault::Stall => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(0)
            }
            Fault::Open | Fault::Edge => Ok(0),
        }
    }

    async fn upsert_node(&mut self, _node: &GraphNode) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert_edge(&mut self, edge: &GraphEdge) -> Result<(), StoreError> {
        Err(StoreError::MissingEndpoint {
            parent: edge.parent.clone(),
            child: edge.child.clone(),
        })
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[rstest]
#[case::unreachable(Fault::Open, 0)]
#[case::reset(Fault::Reset, 1)]
#[case::edge(Fault::Edge, 1)]
#[case::timeout(Fault::Stall, 1)]
#[tokio::test]
async fn store_failures_surface_and_close_the_session(
    #[case] fault: Fault,
    #[case] expected_closes: usize,
) {
    let closed = Arc::new(AtomicUsize::new(0));
    let store = FaultyStore {
        fault,
        closed: Arc::clone(&closed),
    };

    let err = GraphSynchronizer::new(Duration::from_millis(50))
        .synchronize(&diamond(), &AllClasses, &store)
        .await
        .expect_err("store fails");

    match fault {
        Fault::Open => assert!(matches!(err, StoreError::Unreachable(_))),
        Fault::Reset => assert!(matches!(err, StoreError::Unauthorized(_))),
        Fault::Edge => assert!(matches!(err, StoreError::MissingEndpoint { .. })),
        Fault::Stall => assert!(matches!(
            err,
            StoreError::Timeout {
                operation: "reset",
                ..
            }
        )),
    }
    assert_eq!(closed.load(Ordering::SeqCst), expected_closes);
}
