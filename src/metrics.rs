//! Structural statistics over an [`OntologyModel`].

use serde::Serialize;

use crate::ontology::{Iri, OntologyModel};

/// Summary counts of an ontology.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    pub class_count: usize,
    /// Classes whose identifier starts with the model's namespace.
    pub local_class_count: usize,
    pub object_property_count: usize,
    pub data_property_count: usize,
    pub individual_count: usize,
    pub rule_count: usize,
    /// Direct parent/child pairs over every class, unfiltered.
    pub subclass_relationship_count: usize,
    /// Sum of domain and range declarations over all properties.
    pub property_assertion_count: usize,
    /// Rough size signal, **not** an OWL axiom count: the plain sum of every
    /// other count except `local_class_count`.
    pub approximate_axiom_count: usize,
}

impl Metrics {
    /// Rows in report order, with their captions.
    #[must_use]
    pub fn rows(&self) -> [(&'static str, usize); 8] {
        [
            ("Number of Classes", self.class_count),
            ("Number of Local Classes", self.local_class_count),
            ("Number of Object Properties", self.object_property_count),
            ("Number of Data Properties", self.data_property_count),
            ("Number of Individuals", self.individual_count),
            ("Number of Axioms (Approx)", self.approximate_axiom_count),
            ("Number of Rules (SWRL)", self.rule_count),
            (
                "Number of Subclass Relationships",
                self.subclass_relationship_count,
            ),
        ]
    }
}

pub struct MetricsCollector;

impl MetricsCollector {
    /// Computes [`Metrics`] for `model`. Pure and deterministic.
    #[must_use]
    pub fn collect(model: &OntologyModel) -> Metrics {
        let class_count = model.class_count();
        let local_class_count = model.local_classes().count();
        let object_property_count = model.object_properties().count();
        let data_property_count = model.data_properties().count();
        let individual_count = model.individuals().count();
        let rule_count = model.rules().len();

        let subclass_relationship_count = model
            .classes()
            .map(|class| model.subclasses(class.id()).count())
            .sum();

        let property_assertion_count = model
            .object_properties()
            .chain(model.data_properties())
            .map(|property| property.domains().len() + property.ranges().len())
            .sum();

        let approximate_axiom_count = class_count
            + object_property_count
            + data_property_count
            + individual_count
            + rule_count
            + subclass_relationship_count
            + property_assertion_count;

        Metrics {
            class_count,
            local_class_count,
            object_property_count,
            data_property_count,
            individual_count,
            rule_count,
            subclass_relationship_count,
            property_assertion_count,
            approximate_axiom_count,
        }
    }
}

/// Identifiers printed alongside the metrics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OntologyOverview {
    pub sample_classes: Vec<Iri>,
    pub sample_local_classes: Vec<Iri>,
    pub sample_object_properties: Vec<Iri>,
}

impl OntologyOverview {
    const CLASS_SAMPLES: usize = 5;
    const PROPERTY_SAMPLES: usize = 10;

    #[must_use]
    pub fn sample(model: &OntologyModel) -> Self {
        Self {
            sample_classes: model
                .classes()
                .take(Self::CLASS_SAMPLES)
                .map(|class| class.id().clone())
                .collect(),
            sample_local_classes: model
                .local_classes()
                .take(Self::CLASS_SAMPLES)
                .map(|class| class.id().clone())
                .collect(),
            sample_object_properties: model
                .object_properties()
                .take(Self::PROPERTY_SAMPLES)
                .map(|property| property.id().clone())
                .collect(),
        }
    }
}
