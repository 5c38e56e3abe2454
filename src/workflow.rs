//! One batch run: load, measure, query, synchronize.
//!
//! Only a failed load aborts the run. A malformed pattern leaves the query
//! result empty, and a store failure marks the run as degraded while the
//! metrics and query results are still returned.

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    config::{Config, GraphSettings},
    graph::{
        AllClasses, ClassFilter, GraphSchema, GraphStore, GraphSynchronizer, InMemoryGraphStore,
        LocalNamespace, StoreError, SyncResult,
    },
    metrics::{Metrics, MetricsCollector, OntologyOverview},
    ontology::{loader, Iri, OntologyModel},
    query::{LabelPattern, PatternQueryEngine, QueryMatch},
    Result,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Complete,
    Degraded { reasons: Vec<String> },
}

impl RunStatus {
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Where the synchronized graph can be inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Visualization {
    pub browser_url: String,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GraphOutcome {
    Disabled,
    Synchronized {
        target: String,
        result: SyncResult,
        visualization: Option<Visualization>,
    },
    Failed {
        target: String,
        reason: String,
    },
}

/// Everything a run produced, ready for the report.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub ontology: Iri,
    pub metrics: Metrics,
    pub overview: OntologyOverview,
    pub pattern: LabelPattern,
    pub matches: Vec<QueryMatch>,
    pub query_warning: Option<String>,
    pub cyclic_classes: Vec<Iri>,
    pub graph: GraphOutcome,
    pub status: RunStatus,
}

/// Query results, or the reason they are empty.
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    pub matches: Vec<QueryMatch>,
    pub warning: Option<String>,
}

/// Builds the store a run writes to. A dry run keeps the graph in memory.
///
/// # Errors
/// Returns [`StoreError`] for invalid label or relationship names, or when
/// Neo4j support is not compiled in.
pub fn open_store(settings: &GraphSettings, dry_run: bool) -> Result<Box<dyn GraphStore>, StoreError> {
    if dry_run {
        let schema = GraphSchema::new(&settings.label, &settings.relationship)?;
        return Ok(Box::new(InMemoryGraphStore::new(schema)));
    }

    #[cfg(feature = "neo4j")]
    return Ok(Box::new(crate::graph::Neo4jGraphStore::from_settings(
        settings,
    )?));

    #[cfg(not(feature = "neo4j"))]
    Err(StoreError::Backend(
        "built without the `neo4j` feature; use a dry run".to_string(),
    ))
}

pub struct Workflow<'a> {
    config: &'a Config,
    dry_run: bool,
}

impl<'a> Workflow<'a> {
    #[must_use]
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            dry_run: false,
        }
    }

    /// Synchronize into memory instead of the configured store.
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// # Errors
    /// Returns an error when the ontology cannot be loaded.
    pub fn load(&self) -> Result<OntologyModel> {
        Ok(loader::load(&self.config.ontology)?)
    }

    /// Metrics of `model`, with the overview samples logged.
    #[must_use]
    pub fn measure(&self, model: &OntologyModel) -> (Metrics, OntologyOverview) {
        let metrics = MetricsCollector::collect(model);
        let overview = OntologyOverview::sample(model);
        for (caption, value) in metrics.rows() {
            info!(metric = caption, value, "ontology metric");
        }
        info!(
            classes = ?overview.sample_classes,
            local_classes = ?overview.sample_local_classes,
            object_properties = ?overview.sample_object_properties,
            "ontology overview"
        );
        (metrics, overview)
    }

    /// Runs the configured pattern. A malformed pattern yields no matches
    /// and a warning.
    #[must_use]
    pub fn query(&self, model: &OntologyModel) -> QueryOutcome {
        let pattern = &self.config.query.pattern;
        match PatternQueryEngine::query_pattern(model, pattern) {
            Ok(matches) => {
                info!(pattern = %pattern, matches = matches.len(), "pattern query");
                QueryOutcome {
                    matches,
                    warning: None,
                }
            }
            Err(err) => {
                warn!(pattern = %pattern, error = %err, "pattern query failed");
                QueryOutcome {
                    matches: Vec::new(),
                    warning: Some(err.to_string()),
                }
            }
        }
    }

    /// Synchronizes `model` into `store`, turning a failure into
    /// [`GraphOutcome::Failed`].
    pub async fn synchronize(&self, model: &OntologyModel, store: &dyn GraphStore) -> GraphOutcome {
        let settings = &self.config.graph;
        if !settings.enable {
            info!("graph synchronization disabled");
            return GraphOutcome::Disabled;
        }

        let filter: &dyn ClassFilter = if settings.local_only {
            &LocalNamespace
        } else {
            &AllClasses
        };
        let target = store.describe();
        let synchronizer = GraphSynchronizer::new(settings.timeout());

        match synchronizer.synchronize(model, filter, store).await {
            Ok(result) => {
                let visualization = if self.dry_run {
                    None
                } else {
                    GraphSchema::new(&settings.label, &settings.relationship)
                        .ok()
                        .map(|schema| Visualization {
                            browser_url: settings.browser_url.clone(),
                            query: schema.browse_query(),
                        })
                };
                if let Some(visualization) = &visualization {
                    info!(
                        browser_url = %visualization.browser_url,
                        query = %visualization.query,
                        "graph ready for visualization"
                    );
                }
                GraphOutcome::Synchronized {
                    target,
                    result,
                    visualization,
                }
            }
            Err(err) => Self::failed(target, &err),
        }
    }

    fn failed(target: String, err: &StoreError) -> GraphOutcome {
        warn!(target = %target, error = %err, "graph synchronization failed");
        GraphOutcome::Failed {
            target,
            reason: err.to_string(),
        }
    }

    /// Runs against the store described by the configuration.
    ///
    /// # Errors
    /// Returns an error only when the ontology cannot be loaded.
    pub async fn run(&self) -> Result<RunOutcome> {
        let model = self.load()?;
        let analysis = self.analyze(&model);
        let graph = if !self.config.graph.enable {
            GraphOutcome::Disabled
        } else {
            match open_store(&self.config.graph, self.dry_run) {
                Ok(store) => self.synchronize(&model, store.as_ref()).await,
                Err(err) => Self::failed(self.config.graph.uri.clone(), &err),
            }
        };
        Ok(Self::assemble(&model, analysis, graph))
    }

    /// Runs against an explicit store.
    ///
    /// # Errors
    /// Returns an error only when the ontology cannot be loaded.
    pub async fn run_with_store(&self, store: &dyn GraphStore) -> Result<RunOutcome> {
        let model = self.load()?;
        Ok(self.run_model(&model, store).await)
    }

    /// Runs against an already loaded model.
    pub async fn run_model(&self, model: &OntologyModel, store: &dyn GraphStore) -> RunOutcome {
        let analysis = self.analyze(model);
        let graph = self.synchronize(model, store).await;
        Self::assemble(model, analysis, graph)
    }

    fn analyze(&self, model: &OntologyModel) -> Analysis {
        let (metrics, overview) = self.measure(model);
        let query = self.query(model);
        let cyclic_classes = model.cyclic_classes();
        if !cyclic_classes.is_empty() {
            warn!(classes = ?cyclic_classes, "subclass hierarchy contains cycles");
        }
        Analysis {
            pattern: self.config.query.pattern.clone(),
            metrics,
            overview,
            query,
            cyclic_classes,
        }
    }

    fn assemble(model: &OntologyModel, analysis: Analysis, graph: GraphOutcome) -> RunOutcome {
        let status = match &graph {
            GraphOutcome::Failed { reason, .. } => RunStatus::Degraded {
                reasons: vec![format!("graph synchronization failed: {reason}")],
            },
            GraphOutcome::Disabled | GraphOutcome::Synchronized { .. } => RunStatus::Complete,
        };

        RunOutcome {
            ontology: model.ontology().id().clone(),
            metrics: analysis.metrics,
            overview: analysis.overview,
            pattern: analysis.pattern,
            matches: analysis.query.matches,
            query_warning: analysis.query.warning,
            cyclic_classes: analysis.cyclic_classes,
            graph,
            status,
        }
    }
}

struct Analysis {
    pattern: LabelPattern,
    metrics: Metrics,
    overview: OntologyOverview,
    query: QueryOutcome,
    cyclic_classes: Vec<Iri>,
}
