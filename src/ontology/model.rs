//! Read-only view over a loaded [`Ontology`].
//!
//! Every consumer (metrics, label queries, graph synchronization) receives the
//! same [`OntologyModel`] handle. The model is immutable once built and cheap
//! to clone.

use std::{
    collections::{btree_set, BTreeMap, BTreeSet, VecDeque},
    sync::Arc,
};

use super::{
    entities::{Class, Individual, Ontology, Property, PropertyKind, Rule},
    value_objects::{Iri, Namespace},
};

#[derive(Debug)]
struct ModelInner {
    ontology: Ontology,
    namespace: Namespace,
    children: BTreeMap<Iri, BTreeSet<Iri>>,
}

/// Immutable, shareable handle over a loaded ontology.
#[derive(Clone, Debug)]
pub struct OntologyModel {
    inner: Arc<ModelInner>,
}

impl OntologyModel {
    /// Wraps `ontology`, indexing direct subclasses by parent.
    ///
    /// Only pairs where both endpoints are declared classes enter the index.
    #[must_use]
    pub fn new(ontology: Ontology, namespace: Namespace) -> Self {
        let mut children: BTreeMap<Iri, BTreeSet<Iri>> = BTreeMap::new();
        for (id, class) in ontology.classes() {
            for parent in class.parents() {
                if ontology.class(parent).is_some() {
                    children
                        .entry(parent.clone())
                        .or_default()
                        .insert(id.clone());
                }
            }
        }

        Self {
            inner: Arc::new(ModelInner {
                ontology,
                namespace,
                children,
            }),
        }
    }

    #[must_use]
    pub fn ontology(&self) -> &Ontology {
        &self.inner.ontology
    }

    /// Namespace treated as local.
    #[must_use]
    pub fn namespace(&self) -> &Namespace {
        &self.inner.namespace
    }

    #[must_use]
    pub fn class(&self, id: &Iri) -> Option<&Class> {
        self.inner.ontology.class(id)
    }

    /// Classes in identifier order. The order is stable for a given model.
    pub fn classes(&self) -> impl Iterator<Item = &Class> + '_ {
        self.inner.ontology.classes().values()
    }

    #[must_use]
    pub fn class_count(&self) -> usize {
        self.inner.ontology.classes().len()
    }

    /// Whether `class` belongs to the local namespace.
    #[must_use]
    pub fn is_local(&self, class: &Class) -> bool {
        self.inner.namespace.contains(class.id())
    }

    pub fn local_classes(&self) -> impl Iterator<Item = &Class> + '_ {
        self.classes().filter(|class| self.is_local(class))
    }

    pub fn object_properties(&self) -> impl Iterator<Item = &Property> + '_ {
        self.properties_of_kind(PropertyKind::Object)
    }

    pub fn data_properties(&self) -> impl Iterator<Item = &Property> + '_ {
        self.properties_of_kind(PropertyKind::Data)
    }

    fn properties_of_kind(&self, kind: PropertyKind) -> impl Iterator<Item = &Property> + '_ {
        self.inner
            .ontology
            .properties()
            .values()
            .filter(move |property| property.kind() == kind)
    }

    pub fn individuals(&self) -> impl Iterator<Item = &Individual> + '_ {
        self.inner.ontology.individuals().values()
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        self.inner.ontology.rules()
    }

    /// Classes declared directly beneath `class`.
    pub fn subclasses(&self, class: &Iri) -> impl Iterator<Item = &Class> + '_ {
        self.inner
            .children
            .get(class)
            .into_iter()
            .flatten()
            .filter_map(|child| self.inner.ontology.class(child))
    }

    /// Classes declared directly above `class`.
    pub fn superclasses(&self, class: &Iri) -> impl Iterator<Item = &Class> + '_ {
        self.inner
            .ontology
            .class(class)
            .into_iter()
            .flat_map(|class| class.parents().iter())
            .filter_map(|parent| self.inner.ontology.class(parent))
    }

    /// Every class reachable below `class`, in breadth-first order.
    ///
    /// Each class is visited once, so cycles in a malformed hierarchy end the
    /// walk instead of looping. A class on a cycle appears among its own
    /// descendants.
    #[must_use]
    pub fn descendants(&self, class: &Iri) -> Vec<Iri> {
        let mut visited = BTreeSet::new();
        let mut to_visit: VecDeque<&Iri> = self
            .inner
            .children
            .get(class)
            .into_iter()
            .flatten()
            .collect();
        let mut result = Vec::new();

        while let Some(current) = to_visit.pop_front() {
            if visited.insert(current) {
                result.push(current.clone());
                if let Some(next) = self.inner.children.get(current) {
                    to_visit.extend(next.iter());
                }
            }
        }

        result
    }

    /// Classes that are their own descendants, in IRI order.
    ///
    /// One pass over the subclass index: a class is cyclic when it has a
    /// subclass edge to itself or shares a strongly connected component
    /// with another class.
    #[must_use]
    pub fn cyclic_classes(&self) -> Vec<Iri> {
        let mut walk = ComponentWalk::new(&self.inner.children);
        for root in self.inner.children.keys() {
            walk.run(root);
        }
        walk.cyclic.into_iter().cloned().collect()
    }
}

/// Iterative Tarjan walk over the subclass index.
struct ComponentWalk<'a> {
    children: &'a BTreeMap<Iri, BTreeSet<Iri>>,
    next_index: usize,
    index: BTreeMap<&'a Iri, usize>,
    low: BTreeMap<&'a Iri, usize>,
    stack: Vec<&'a Iri>,
    on_stack: BTreeSet<&'a Iri>,
    frames: Vec<(&'a Iri, Option<btree_set::Iter<'a, Iri>>)>,
    cyclic: BTreeSet<&'a Iri>,
}

impl<'a> ComponentWalk<'a> {
    fn new(children: &'a BTreeMap<Iri, BTreeSet<Iri>>) -> Self {
        Self {
            children,
            next_index: 0,
            index: BTreeMap::new(),
            low: BTreeMap::new(),
            stack: Vec::new(),
            on_stack: BTreeSet::new(),
            frames: Vec::new(),
            cyclic: BTreeSet::new(),
        }
    }

    fn enter(&mut self, class: &'a Iri) {
        self.index.insert(class, self.next_index);
        self.low.insert(class, self.next_index);
        self.next_index += 1;
        self.stack.push(class);
        self.on_stack.insert(class);
        let children = self.children;
        self.frames
            .push((class, children.get(class).map(BTreeSet::iter)));
    }

    fn lower(&mut self, class: &'a Iri, candidate: usize) {
        if let Some(low) = self.low.get_mut(class) {
            *low = (*low).min(candidate);
        }
    }

    fn run(&mut self, root: &'a Iri) {
        if self.index.contains_key(root) {
            return;
        }
        self.enter(root);

        while let Some((class, children)) = self.frames.last_mut() {
            let class = *class;
            match children.as_mut().and_then(Iterator::next) {
                Some(child) => {
                    if child == class {
                        self.cyclic.insert(class);
                    }
                    match self.index.get(child).copied() {
                        None => self.enter(child),
                        Some(child_index) if self.on_stack.contains(child) => {
                            self.lower(class, child_index);
                        }
                        Some(_) => {}
                    }
                }
                None => {
                    self.frames.pop();
                    let low = self.low.get(class).copied().unwrap_or_default();
                    if let Some((parent, _)) = self.frames.last() {
                        let parent = *parent;
                        self.lower(parent, low);
                    }
                    if self.index.get(class).copied() == Some(low) {
                        self.close_component(class);
                    }
                }
            }
        }
    }

    fn close_component(&mut self, root: &'a Iri) {
        let mut members = Vec::new();
        while let Some(member) = self.stack.pop() {
            self.on_stack.remove(member);
            members.push(member);
            if member == root {
                break;
            }
        }
        if members.len() > 1 {
            self.cyclic.extend(members);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::entities::Class;

    fn iri(text: &str) -> Iri {
        Iri::new(text).expect("valid iri")
    }

    fn class(name: &str, parents: &[&str]) -> Class {
        let mut class = Class::new(iri(&format!("https://example.org/onto#{name}")));
        for parent in parents {
            class.add_parent(iri(&format!("https://example.org/onto#{parent}")));
        }
        class
    }

    fn model(classes: Vec<Class>) -> OntologyModel {
        let mut ontology = Ontology::new(iri("https://example.org/onto"));
        for class in classes {
            ontology.add_class(class).expect("class inserted");
        }
        OntologyModel::new(ontology, Namespace::new("https://example.org/onto#"))
    }

    fn names<'a>(classes: impl Iterator<Item = &'a Class>) -> Vec<&'a str> {
        classes.map(|class| class.id().local_name()).collect()
    }

    #[test]
    fn indexes_direct_subclasses_and_superclasses() {
        let model = model(vec![
            class("A", &[]),
            class("B", &["A"]),
            class("C", &["A"]),
            class("D", &["B", "C"]),
        ]);

        assert_eq!(names(model.subclasses(&iri("https://example.org/onto#A"))), vec!["B", "C"]);
        assert_eq!(names(model.superclasses(&iri("https://example.org/onto#D"))), vec!["B", "C"]);
        assert_eq!(model.subclasses(&iri("https://example.org/onto#D")).count(), 0);
    }

    #[test]
    fn ignores_parents_that_are_not_declared_classes() {
        let model = model(vec![class("X", &["Undeclared"])]);

        assert_eq!(model.superclasses(&iri("https://example.org/onto#X")).count(), 0);
        assert_eq!(
            model
                .subclasses(&iri("https://example.org/onto#Undeclared"))
                .count(),
            0
        );
    }

    #[test]
    fn descendants_visit_each_class_once() {
        let model = model(vec![
            class("A", &[]),
            class("B", &["A"]),
            class("C", &["A"]),
            class("D", &["B", "C"]),
        ]);

        let descendants = model.descendants(&iri("https://example.org/onto#A"));
        assert_eq!(descendants.len(), 3);
        assert!(model.cyclic_classes().is_empty());
    }

    #[test]
    fn cycles_terminate_and_are_reported() {
        let model = model(vec![class("P", &["Q"]), class("Q", &["P"]), class("R", &["P"])]);

        let descendants = model.descendants(&iri("https://example.org/onto#P"));
        assert_eq!(descendants.len(), 3);
        assert_eq!(
            model.cyclic_classes(),
            vec![iri("https://example.org/onto#P"), iri("https://example.org/onto#Q")]
        );
    }

    #[test]
    fn self_loops_and_disjoint_cycles_are_reported() {
        let model = model(vec![
            class("P", &["Q"]),
            class("Q", &["P"]),
            class("S", &["S"]),
            class("T", &["P"]),
            class("U", &["T"]),
        ]);

        assert_eq!(
            model.cyclic_classes(),
            vec![
                iri("https://example.org/onto#P"),
                iri("https://example.org/onto#Q"),
                iri("https://example.org/onto#S"),
            ]
        );
    }

    #[test]
    fn long_chains_are_not_cyclic() {
        let names: Vec<String> = (0..500).map(|n| format!("C{n}")).collect();
        let classes = names
            .iter()
            .enumerate()
            .map(|(n, name)| {
                if n == 0 {
                    class(name, &[])
                } else {
                    class(name, &[names[n - 1].as_str()])
                }
            })
            .collect();
        let model = model(classes);

        assert!(model.cyclic_classes().is_empty());
        assert_eq!(model.descendants(&iri("https://example.org/onto#C0")).len(), 499);
    }

    #[test]
    fn namespace_membership_is_recomputed_per_class() {
        let mut ontology = Ontology::new(iri("https://example.org/onto"));
        ontology
            .add_class(Class::new(iri("https://example.org/onto#Local")))
            .expect("class");
        ontology
            .add_class(Class::new(iri("http://purl.obolibrary.org/obo/BFO_0000001")))
            .expect("class");
        let model = OntologyModel::new(ontology, Namespace::new("https://example.org/onto#"));

        assert_eq!(model.class_count(), 2);
        assert_eq!(names(model.local_classes()), vec!["Local"]);
    }
}
