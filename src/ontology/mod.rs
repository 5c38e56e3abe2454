//! Core ontology domain primitives.
//!
//! The module keeps the ontology aggregate independent from the RDF parser:
//! [`loader`] is the only place that knows about serializations, and every
//! other component reads the immutable [`OntologyModel`] it produces.

pub mod entities;
pub mod loader;
pub mod model;
pub mod value_objects;

pub use entities::{Class, Individual, Ontology, OntologyError, Property, PropertyKind, Rule};
pub use loader::{LoadError, OntologyLoader, SourceFormat};
pub use model::OntologyModel;
pub use value_objects::{Iri, IriError, Namespace};
