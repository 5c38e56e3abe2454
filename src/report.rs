//! Markdown overview of a run.

use std::{fmt::Write as _, fs, path::Path};

use serde::Serialize;
use tera::{Context, Tera};
use tracing::info;

use crate::{
    workflow::{GraphOutcome, RunOutcome},
    Result,
};

const TEMPLATE: &str = r"# {{ title }}

Ontology: `{{ ontology }}`

## Summary Metrics

| Metric | Value |
| --- | ---: |
{% for row in metrics %}| {{ row.caption }} | {{ row.value }} |
{% endfor %}
## Pattern Results

Pattern: {{ pattern }}

{% if matches %}| Class | Label |
| --- | --- |
{% for row in matches %}| {{ row.class }} | {{ row.label }} |
{% endfor %}{% else %}No matching terms found.
{% endif %}{% if query_warning %}
> Query failed: {{ query_warning }}
{% endif %}
## Class Hierarchy Graph

{{ graph }}
";

#[derive(Serialize)]
struct MetricRow {
    caption: &'static str,
    value: usize,
}

#[derive(Serialize)]
struct MatchRow {
    class: String,
    label: String,
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn graph_section(graph: &GraphOutcome) -> String {
    let mut section = String::new();
    match graph {
        GraphOutcome::Disabled => section.push_str("Graph synchronization is disabled."),
        GraphOutcome::Synchronized {
            target,
            result,
            visualization,
        } => {
            let _ = write!(
                section,
                "Loaded {} classes and {} subclass relationships into {target}.",
                result.nodes_written, result.edges_written
            );
            for warning in &result.warnings {
                let _ = write!(section, "\n\n> Warning: {warning}");
            }
            if let Some(visualization) = visualization {
                let _ = write!(
                    section,
                    "\n\nTo visualize, open {} and run:\n\n```cypher\n{}\n```",
                    visualization.browser_url, visualization.query
                );
            }
        }
        GraphOutcome::Failed { target, reason } => {
            let _ = write!(
                section,
                "Synchronization with {target} failed, the run is degraded: {reason}"
            );
        }
    }
    section
}

pub struct ReportWriter {
    title: String,
}

impl ReportWriter {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    /// Renders `outcome` as Markdown.
    ///
    /// # Errors
    /// Returns an error when the template cannot be rendered.
    pub fn render(&self, outcome: &RunOutcome) -> Result<String> {
        let metrics: Vec<MetricRow> = outcome
            .metrics
            .rows()
            .into_iter()
            .map(|(caption, value)| MetricRow { caption, value })
            .collect();
        let matches: Vec<MatchRow> = outcome
            .matches
            .iter()
            .map(|found| MatchRow {
                class: cell(found.class.as_str()),
                label: cell(&found.label),
            })
            .collect();

        let mut context = Context::new();
        context.insert("title", &self.title);
        context.insert("ontology", outcome.ontology.as_str());
        context.insert("metrics", &metrics);
        context.insert("pattern", &outcome.pattern.to_string());
        context.insert("matches", &matches);
        context.insert("query_warning", &outcome.query_warning);
        context.insert("graph", &graph_section(&outcome.graph));

        Ok(Tera::one_off(TEMPLATE, &context, false)?)
    }

    /// Renders `outcome` and writes it to `path`.
    ///
    /// # Errors
    /// Returns an error when rendering or writing fails.
    pub fn write(&self, outcome: &RunOutcome, path: &Path) -> Result<()> {
        let markdown = self.render(outcome)?;
        fs::write(path, markdown)?;
        info!(path = %path.display(), "report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        graph::SyncResult,
        metrics::{Metrics, OntologyOverview},
        ontology::Iri,
        query::{LabelPattern, QueryMatch},
        workflow::{RunStatus, Visualization},
    };

    fn outcome(graph: GraphOutcome) -> RunOutcome {
        RunOutcome {
            ontology: Iri::new("https://example.org/onto").expect("iri"),
            metrics: Metrics::default(),
            overview: OntologyOverview::default(),
            pattern: LabelPattern::default(),
            matches: vec![QueryMatch {
                class: Iri::new("https://example.org/onto#Odd").expect("iri"),
                label: "a | b".to_string(),
            }],
            query_warning: None,
            cyclic_classes: Vec::new(),
            graph,
            status: RunStatus::Complete,
        }
    }

    #[test]
    fn escapes_table_separators() {
        let markdown = ReportWriter::new("Overview")
            .render(&outcome(GraphOutcome::Disabled))
            .expect("render");
        assert!(markdown.contains("| https://example.org/onto#Odd | a \\| b |"));
    }

    #[test]
    fn graph_section_names_the_visualization_query() {
        let section = graph_section(&GraphOutcome::Synchronized {
            target: "bolt://localhost:7687".into(),
            result: SyncResult {
                nodes_written: 2,
                edges_written: 1,
                warnings: Vec::new(),
            },
            visualization: Some(Visualization {
                browser_url: "http://localhost:7474".into(),
                query: "MATCH (n:Class)-[:HAS_SUBCLASS]->(m:Class) RETURN n, m".into(),
            }),
        });
        assert!(section.starts_with("Loaded 2 classes and 1 subclass relationships"));
        assert!(section.contains("open http://localhost:7474"));
        assert!(section.contains("MATCH (n:Class)-[:HAS_SUBCLASS]->(m:Class) RETURN n, m"));
    }

    #[test]
    fn writes_the_report_to_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("overview.md");
        ReportWriter::new("Overview")
            .write(&outcome(GraphOutcome::Disabled), &path)
            .expect("write");
        let written = fs::read_to_string(&path).expect("read");
        assert!(written.starts_with("# Overview\n"));
        assert!(written.contains("Graph synchronization is disabled."));
    }
}
