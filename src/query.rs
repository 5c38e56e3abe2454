//! Label pattern queries over the classes of an [`OntologyModel`].

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ontology::{Iri, OntologyModel};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid label pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("label pattern has an empty search term")]
    EmptyTerm,
}

/// Predicate over a class label. Unlabeled classes are tested with `""`.
pub trait LabelPredicate {
    fn matches(&self, label: &str) -> bool;
}

impl<F> LabelPredicate for F
where
    F: Fn(&str) -> bool,
{
    fn matches(&self, label: &str) -> bool {
        self(label)
    }
}

/// Declarative label pattern, as written in configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LabelPattern {
    /// Substring containment, case-insensitive unless stated otherwise.
    Contains {
        term: String,
        #[serde(default)]
        case_sensitive: bool,
    },
    /// Regular expression searched anywhere in the label.
    Regex { pattern: String },
}

impl Default for LabelPattern {
    fn default() -> Self {
        Self::Contains {
            term: "rubber".to_string(),
            case_sensitive: false,
        }
    }
}

impl LabelPattern {
    /// Case-insensitive containment of `term`.
    #[must_use]
    pub fn contains(term: impl Into<String>) -> Self {
        Self::Contains {
            term: term.into(),
            case_sensitive: false,
        }
    }

    /// Validates the pattern and prepares it for matching.
    ///
    /// # Errors
    /// Returns [`QueryError`] for empty terms and invalid regular expressions.
    pub fn compile(&self) -> Result<CompiledPattern, QueryError> {
        match self {
            Self::Contains { term, .. } if term.is_empty() => Err(QueryError::EmptyTerm),
            Self::Contains {
                term,
                case_sensitive: true,
            } => Ok(CompiledPattern::Contains {
                needle: term.clone(),
                case_sensitive: true,
            }),
            Self::Contains {
                term,
                case_sensitive: false,
            } => Ok(CompiledPattern::Contains {
                needle: term.to_lowercase(),
                case_sensitive: false,
            }),
            Self::Regex { pattern } => RegexBuilder::new(pattern)
                .build()
                .map(CompiledPattern::Regex)
                .map_err(|err| QueryError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: err.to_string(),
                }),
        }
    }
}

impl std::fmt::Display for LabelPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Contains {
                term,
                case_sensitive: false,
            } => write!(f, "label contains \"{term}\" (case-insensitive)"),
            Self::Contains { term, .. } => write!(f, "label contains \"{term}\""),
            Self::Regex { pattern } => write!(f, "label matches /{pattern}/"),
        }
    }
}

#[derive(Clone, Debug)]
pub enum CompiledPattern {
    Contains { needle: String, case_sensitive: bool },
    Regex(Regex),
}

impl LabelPredicate for CompiledPattern {
    fn matches(&self, label: &str) -> bool {
        match self {
            Self::Contains {
                needle,
                case_sensitive: true,
            } => label.contains(needle.as_str()),
            Self::Contains { needle, .. } => label.to_lowercase().contains(needle.as_str()),
            Self::Regex(regex) => regex.is_match(label),
        }
    }
}

/// One matching class.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QueryMatch {
    pub class: Iri,
    pub label: String,
}

pub struct PatternQueryEngine;

impl PatternQueryEngine {
    /// Returns the classes whose label satisfies `predicate`, in the model's
    /// class order. Never fails; an empty model yields an empty result.
    pub fn query<P>(model: &OntologyModel, predicate: &P) -> Vec<QueryMatch>
    where
        P: LabelPredicate + ?Sized,
    {
        model
            .classes()
            .filter(|class| predicate.matches(class.label_or_empty()))
            .map(|class| QueryMatch {
                class: class.id().clone(),
                label: class.label_or_empty().to_string(),
            })
            .collect()
    }

    /// Compiles `pattern` and runs it.
    ///
    /// # Errors
    /// Returns [`QueryError`] when the pattern is malformed.
    pub fn query_pattern(
        model: &OntologyModel,
        pattern: &LabelPattern,
    ) -> Result<Vec<QueryMatch>, QueryError> {
        let compiled = pattern.compile()?;
        Ok(Self::query(model, &compiled))
    }
}
