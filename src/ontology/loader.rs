//! Builds an [`OntologyModel`] from an RDF serialization.
//!
//! Parsing is delegated to [`oxigraph::io::RdfParser`]; the rest of the crate
//! only ever sees the [`Ontology`] aggregate produced here.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use oxigraph::{
    io::{RdfFormat, RdfParser},
    model::{Subject, Term},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::{
    entities::{Class, Individual, Ontology, OntologyError, Property, PropertyKind, Rule},
    model::OntologyModel,
    value_objects::{Iri, IriError, Namespace},
};
use crate::config::OntologySettings;

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
const RDF_FIRST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#first";
const RDF_REST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#rest";
const RDFS_CLASS: &str = "http://www.w3.org/2000/01/rdf-schema#Class";
const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
const RDFS_COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";
const RDFS_SUB_CLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
const RDFS_DOMAIN: &str = "http://www.w3.org/2000/01/rdf-schema#domain";
const RDFS_RANGE: &str = "http://www.w3.org/2000/01/rdf-schema#range";
const OWL_ONTOLOGY: &str = "http://www.w3.org/2002/07/owl#Ontology";
const OWL_CLASS: &str = "http://www.w3.org/2002/07/owl#Class";
const OWL_THING: &str = "http://www.w3.org/2002/07/owl#Thing";
const OWL_OBJECT_PROPERTY: &str = "http://www.w3.org/2002/07/owl#ObjectProperty";
const OWL_DATATYPE_PROPERTY: &str = "http://www.w3.org/2002/07/owl#DatatypeProperty";
const OWL_NAMED_INDIVIDUAL: &str = "http://www.w3.org/2002/07/owl#NamedIndividual";
const SWRL_IMP: &str = "http://www.w3.org/2003/11/swrl#Imp";
const SWRL_BODY: &str = "http://www.w3.org/2003/11/swrl#body";
const SWRL_HEAD: &str = "http://www.w3.org/2003/11/swrl#head";

const ANONYMOUS_ONTOLOGY: &str = "urn:ontoscope:anonymous";

/// Errors raised while loading an ontology. Every one of them is fatal for a
/// run.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("ontology source `{}` does not exist", path.display())]
    NotFound { path: PathBuf },

    #[error("ontology source `{}` is not a file", path.display())]
    NotAFile { path: PathBuf },

    #[error("cannot guess the serialization of `{}`; set `ontology.format`", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("cannot read ontology source `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse `{origin}`: {message}")]
    Parse { origin: String, message: String },

    #[error(transparent)]
    InvalidIri(#[from] IriError),

    #[error("inconsistent ontology: {0}")]
    Domain(#[from] OntologyError),
}

/// RDF serializations accepted as ontology sources.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    RdfXml,
    Turtle,
    NTriples,
    NQuads,
    TriG,
    N3,
}

impl SourceFormat {
    /// Guesses the serialization from the file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "owl" | "rdf" | "xml" => Some(Self::RdfXml),
            "ttl" => Some(Self::Turtle),
            "nt" => Some(Self::NTriples),
            "nq" => Some(Self::NQuads),
            "trig" => Some(Self::TriG),
            "n3" => Some(Self::N3),
            _ => None,
        }
    }

    fn rdf_format(self) -> RdfFormat {
        match self {
            Self::RdfXml => RdfFormat::RdfXml,
            Self::Turtle => RdfFormat::Turtle,
            Self::NTriples => RdfFormat::NTriples,
            Self::NQuads => RdfFormat::NQuads,
            Self::TriG => RdfFormat::TriG,
            Self::N3 => RdfFormat::N3,
        }
    }
}

/// Loads the ontology described by the `ontology` configuration section.
///
/// # Errors
/// Returns a [`LoadError`] when the source is missing or malformed.
pub fn load(settings: &OntologySettings) -> Result<OntologyModel, LoadError> {
    let mut loader = OntologyLoader::new(Namespace::new(settings.namespace.clone()));
    if let Some(format) = settings.format {
        loader = loader.with_format(format);
    }
    loader.load(&settings.source)
}

/// Parses RDF documents into an [`OntologyModel`].
#[derive(Clone, Debug)]
pub struct OntologyLoader {
    namespace: Namespace,
    format: Option<SourceFormat>,
}

impl OntologyLoader {
    #[must_use]
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            format: None,
        }
    }

    /// Forces a serialization instead of guessing it from the extension.
    #[must_use]
    pub fn with_format(mut self, format: SourceFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Loads the ontology stored at `path`.
    ///
    /// # Errors
    /// Returns a [`LoadError`] when the file is missing, unreadable or not a
    /// valid document in the selected serialization.
    pub fn load(&self, path: &Path) -> Result<OntologyModel, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound {
                path: path.to_path_buf(),
            });
        }
        if !path.is_file() {
            return Err(LoadError::NotAFile {
                path: path.to_path_buf(),
            });
        }
        let format = self
            .format
            .or_else(|| SourceFormat::from_path(path))
            .ok_or_else(|| LoadError::UnsupportedFormat {
                path: path.to_path_buf(),
            })?;

        let file = File::open(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_iri = path
            .canonicalize()
            .ok()
            .map(|absolute| format!("file://{}", absolute.display()));

        info!(path = %path.display(), ?format, "loading ontology");
        self.parse(
            BufReader::new(file),
            format,
            base_iri.as_deref(),
            &path.display().to_string(),
        )
    }

    /// Loads an ontology from any reader, e.g. an in-memory document.
    ///
    /// # Errors
    /// Returns a [`LoadError`] when the document is not valid in `format`.
    pub fn load_from_reader<R: Read>(
        &self,
        reader: R,
        format: SourceFormat,
    ) -> Result<OntologyModel, LoadError> {
        self.parse(reader, format, None, "<reader>")
    }

    fn parse<R: Read>(
        &self,
        reader: R,
        format: SourceFormat,
        base_iri: Option<&str>,
        origin: &str,
    ) -> Result<OntologyModel, LoadError> {
        let parser = match base_iri {
            Some(base) => RdfParser::from_format(format.rdf_format())
                .with_base_iri(base)
                .unwrap_or_else(|err| {
                    debug!(base, error = %err, "ignoring unusable base IRI");
                    RdfParser::from_format(format.rdf_format())
                }),
            None => RdfParser::from_format(format.rdf_format()),
        };

        let mut collector = TripleCollector::default();
        for quad in parser.for_reader(reader) {
            let quad = quad.map_err(|err| LoadError::Parse {
                origin: origin.to_string(),
                message: err.to_string(),
            })?;
            let (Some(subject), Some(object)) = (subject_node(&quad.subject), term_node(&quad.object))
            else {
                continue;
            };
            collector.push(subject, quad.predicate.as_str(), object);
        }

        let statements = collector.statements;
        let ontology = collector.build()?;
        info!(
            statements,
            classes = ontology.classes().len(),
            properties = ontology.properties().len(),
            individuals = ontology.individuals().len(),
            rules = ontology.rules().len(),
            "ontology loaded"
        );
        Ok(OntologyModel::new(ontology, self.namespace.clone()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Node {
    Iri(String),
    Blank(String),
    Literal {
        value: String,
        language: Option<String>,
    },
}

impl Node {
    fn as_iri(&self) -> Option<&str> {
        match self {
            Self::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    fn id(&self) -> Option<String> {
        match self {
            Self::Iri(iri) => Some(iri.clone()),
            Self::Blank(label) => Some(format!("_:{label}")),
            Self::Literal { .. } => None,
        }
    }
}

#[allow(unreachable_patterns)]
fn subject_node(subject: &Subject) -> Option<Node> {
    match subject {
        Subject::NamedNode(node) => Some(Node::Iri(node.as_str().to_owned())),
        Subject::BlankNode(node) => Some(Node::Blank(node.as_str().to_owned())),
        _ => None,
    }
}

#[allow(unreachable_patterns)]
fn term_node(term: &Term) -> Option<Node> {
    match term {
        Term::NamedNode(node) => Some(Node::Iri(node.as_str().to_owned())),
        Term::BlankNode(node) => Some(Node::Blank(node.as_str().to_owned())),
        Term::Literal(literal) => Some(Node::Literal {
            value: literal.value().to_owned(),
            language: literal.language().map(str::to_owned),
        }),
        _ => None,
    }
}

/// Accumulates the statements relevant to the ontology structure, then turns
/// them into an [`Ontology`].
#[derive(Default)]
struct TripleCollector {
    statements: usize,
    types: BTreeMap<Node, BTreeSet<String>>,
    labels: HashMap<Node, Vec<(String, Option<String>)>>,
    comments: HashMap<Node, String>,
    sub_class_of: Vec<(Node, Node)>,
    domains: Vec<(Node, Node)>,
    ranges: Vec<(Node, Node)>,
    list_first: HashMap<Node, Node>,
    list_rest: HashMap<Node, Node>,
    rule_body: HashMap<Node, Node>,
    rule_head: HashMap<Node, Node>,
}

impl TripleCollector {
    fn push(&mut self, subject: Node, predicate: &str, object: Node) {
        self.statements += 1;
        match predicate {
            RDF_TYPE => {
                if let Node::Iri(kind) = object {
                    self.types.entry(subject).or_default().insert(kind);
                }
            }
            RDFS_LABEL => {
                if let Node::Literal { value, language } = object {
                    self.labels.entry(subject).or_default().push((value, language));
                }
            }
            RDFS_COMMENT => {
                if let Node::Literal { value, .. } = object {
                    self.comments.entry(subject).or_insert(value);
                }
            }
            RDFS_SUB_CLASS_OF => self.sub_class_of.push((subject, object)),
            RDFS_DOMAIN => self.domains.push((subject, object)),
            RDFS_RANGE => self.ranges.push((subject, object)),
            RDF_FIRST => {
                self.list_first.insert(subject, object);
            }
            RDF_REST => {
                self.list_rest.insert(subject, object);
            }
            SWRL_BODY => {
                self.rule_body.insert(subject, object);
            }
            SWRL_HEAD => {
                self.rule_head.insert(subject, object);
            }
            _ => {}
        }
    }

    /// Picks a label deterministically: untagged first, then English, then
    /// the first one in document order.
    fn label(&self, node: &Node) -> Option<&str> {
        let labels = self.labels.get(node)?;
        labels
            .iter()
            .find(|(_, language)| language.is_none())
            .or_else(|| {
                labels
                    .iter()
                    .find(|(_, language)| language.as_deref().is_some_and(|l| l.starts_with("en")))
            })
            .or_else(|| labels.first())
            .map(|(value, _)| value.as_str())
    }

    /// Counts the cells of an RDF collection. Each cell is visited once, so a
    /// malformed circular list cannot loop forever.
    fn list_len(&self, head: &Node) -> usize {
        let mut visited = BTreeSet::new();
        let mut current = head;
        let mut len = 0;
        while self.list_first.contains_key(current) && visited.insert(current) {
            len += 1;
            match self.list_rest.get(current) {
                Some(next) => current = next,
                None => break,
            }
        }
        len
    }

    fn build(self) -> Result<Ontology, LoadError> {
        let ontology_node = self
            .types
            .iter()
            .find(|(node, kinds)| node.as_iri().is_some() && kinds.contains(OWL_ONTOLOGY))
            .map(|(node, _)| node.clone());
        let mut ontology = match &ontology_node {
            Some(node @ Node::Iri(iri)) => {
                let ontology = Ontology::new(Iri::new(iri.clone())?);
                match self.label(node) {
                    Some(label) => ontology.with_label(label),
                    None => ontology,
                }
            }
            _ => Ontology::new(Iri::new(ANONYMOUS_ONTOLOGY)?),
        };

        let mut classes: BTreeMap<String, Class> = BTreeMap::new();
        let mut properties: BTreeMap<String, Property> = BTreeMap::new();
        let mut individuals: BTreeMap<String, Individual> = BTreeMap::new();

        for (node, kinds) in &self.types {
            let Some(iri) = node.as_iri() else {
                continue;
            };
            if iri == OWL_THING {
                continue;
            }
            if kinds.contains(OWL_CLASS) || kinds.contains(RDFS_CLASS) {
                let mut class = Class::new(Iri::new(iri)?);
                if let Some(label) = self.label(node) {
                    class = class.with_label(label);
                }
                if let Some(comment) = self.comments.get(node) {
                    class = class.with_comment(comment.clone());
                }
                classes.insert(iri.to_owned(), class);
            }
            let kind = if kinds.contains(OWL_OBJECT_PROPERTY) {
                Some(PropertyKind::Object)
            } else if kinds.contains(OWL_DATATYPE_PROPERTY) {
                Some(PropertyKind::Data)
            } else {
                None
            };
            if let Some(kind) = kind {
                let mut property = Property::new(Iri::new(iri)?, kind);
                if let Some(label) = self.label(node) {
                    property = property.with_label(label);
                }
                properties.insert(iri.to_owned(), property);
            }
        }

        for (node, kinds) in &self.types {
            let Some(iri) = node.as_iri() else {
                continue;
            };
            let declared_type = kinds.iter().any(|kind| classes.contains_key(kind));
            if !(kinds.contains(OWL_NAMED_INDIVIDUAL) || declared_type)
                || classes.contains_key(iri)
                || properties.contains_key(iri)
            {
                continue;
            }
            let mut individual = Individual::new(Iri::new(iri)?);
            for kind in kinds.iter().filter(|kind| classes.contains_key(*kind)) {
                individual.assert_type(Iri::new(kind.clone())?);
            }
            individuals.insert(iri.to_owned(), individual);
        }

        for (child, parent) in &self.sub_class_of {
            let (Some(child), Some(parent)) = (child.as_iri(), parent.as_iri()) else {
                continue;
            };
            if let Some(class) = classes.get_mut(child) {
                class.add_parent(Iri::new(parent)?);
            }
        }

        for (subject, domain) in &self.domains {
            let (Some(subject), Some(domain)) = (subject.as_iri(), domain.as_iri()) else {
                continue;
            };
            if let Some(property) = properties.get_mut(subject) {
                property.add_domain(Iri::new(domain)?);
            }
        }

        for (subject, range) in &self.ranges {
            let (Some(subject), Some(range)) = (subject.as_iri(), range.as_iri()) else {
                continue;
            };
            if let Some(property) = properties.get_mut(subject) {
                property.add_range(Iri::new(range)?);
            }
        }

        for (node, kinds) in &self.types {
            if !kinds.contains(SWRL_IMP) {
                continue;
            }
            let Some(id) = node.id() else {
                continue;
            };
            let body_atoms = self.rule_body.get(node).map_or(0, |list| self.list_len(list));
            let head_atoms = self.rule_head.get(node).map_or(0, |list| self.list_len(list));
            let mut rule = Rule::new(id, body_atoms, head_atoms);
            if let Some(label) = self.label(node) {
                rule = rule.with_label(label);
            }
            ontology.add_rule(rule);
        }

        for class in classes.into_values() {
            ontology.add_class(class)?;
        }
        for property in properties.into_values() {
            ontology.add_property(property)?;
        }
        for individual in individuals.into_values() {
            ontology.add_individual(individual)?;
        }

        Ok(ontology)
    }
}
