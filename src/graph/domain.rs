use std::collections::BTreeMap;

use serde::Serialize;

use crate::ontology::{Class, Iri, OntologyModel};

/// The selected part of the class hierarchy, ready to be written to a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphProjection {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// One selected class, keyed by its identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct GraphNode {
    pub key: Iri,
    pub label: String,
}

/// A direct parent to child subclass pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GraphEdge {
    pub parent: Iri,
    pub child: Iri,
}

/// Decides which classes take part in the projection.
pub trait ClassFilter {
    fn select(&self, model: &OntologyModel, class: &Class) -> bool;
}

impl<F> ClassFilter for F
where
    F: Fn(&Class) -> bool,
{
    fn select(&self, _model: &OntologyModel, class: &Class) -> bool {
        self(class)
    }
}

/// Keeps classes of the model's own namespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalNamespace;

impl ClassFilter for LocalNamespace {
    fn select(&self, model: &OntologyModel, class: &Class) -> bool {
        model.is_local(class)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllClasses;

impl ClassFilter for AllClasses {
    fn select(&self, _model: &OntologyModel, _class: &Class) -> bool {
        true
    }
}

impl GraphProjection {
    /// Projects the classes accepted by `filter` and the direct subclass
    /// pairs whose two endpoints are both accepted.
    pub fn build<F>(model: &OntologyModel, filter: &F) -> Self
    where
        F: ClassFilter + ?Sized,
    {
        let mut nodes: BTreeMap<&Iri, GraphNode> = BTreeMap::new();
        for class in model.classes() {
            if filter.select(model, class) {
                nodes.insert(
                    class.id(),
                    GraphNode {
                        key: class.id().clone(),
                        label: class.display_label().to_string(),
                    },
                );
            }
        }

        let mut edges: Vec<GraphEdge> = Vec::new();
        for parent in nodes.keys() {
            for child in model.subclasses(parent) {
                if nodes.contains_key(child.id()) {
                    edges.push(GraphEdge {
                        parent: (*parent).clone(),
                        child: child.id().clone(),
                    });
                }
            }
        }
        edges.sort();
        edges.dedup();

        Self {
            nodes: nodes.into_values().collect(),
            edges,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
