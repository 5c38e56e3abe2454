#![allow(clippy::module_name_repetitions)]
#![doc = "Structural audits of OWL ontologies and their projection into a property graph."]

pub use self::errors::Error;

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod environment;
pub mod errors;
pub mod graph;
pub mod logger;
pub mod metrics;
pub mod ontology;
pub mod query;
pub mod report;
pub mod workflow;

/// Application results options list
pub type Result<T, E = Error> = std::result::Result<T, E>;
