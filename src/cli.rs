//! Command line entry point.
//!
//! ```sh
//! ontoscope run                      # metrics, query, sync and report
//! ontoscope metrics --json
//! ontoscope query --term elastomer
//! ontoscope sync --dry-run
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::{
    environment::{resolve_from_env, Environment, DEFAULT_ENVIRONMENT},
    logger,
    query::LabelPattern,
    report::ReportWriter,
    workflow::{GraphOutcome, RunOutcome, RunStatus, Workflow},
    Result,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true, help = &format!("Specify the environment [default: {}]", DEFAULT_ENVIRONMENT))]
    environment: Option<String>,

    /// Folder holding the `<environment>.yaml` files
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole inspection and write the report
    Run {
        /// Synchronize into memory instead of Neo4j
        #[arg(long)]
        dry_run: bool,

        /// Override the report location
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print ontology metrics
    Metrics {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List classes whose label matches a pattern
    Query {
        /// Case-insensitive substring of the label
        #[arg(long, conflicts_with = "regex")]
        term: Option<String>,

        /// Regular expression searched in the label
        #[arg(long)]
        regex: Option<String>,

        /// Make `--term` case-sensitive
        #[arg(long, requires = "term")]
        case_sensitive: bool,
    },
    /// Project the class hierarchy into the graph store
    Sync {
        /// Synchronize into memory instead of Neo4j
        #[arg(long)]
        dry_run: bool,

        /// Include imported classes
        #[arg(long)]
        all_classes: bool,
    },
}

fn pattern_override(
    term: Option<String>,
    regex: Option<String>,
    case_sensitive: bool,
) -> Option<LabelPattern> {
    match (term, regex) {
        (Some(term), _) => Some(LabelPattern::Contains {
            term,
            case_sensitive,
        }),
        (None, Some(pattern)) => Some(LabelPattern::Regex { pattern }),
        (None, None) => None,
    }
}

fn print_status(outcome: &RunOutcome) {
    match &outcome.graph {
        GraphOutcome::Disabled => println!("graph synchronization disabled"),
        GraphOutcome::Synchronized {
            target,
            result,
            visualization,
        } => {
            println!(
                "loaded {} classes and {} relationships into {target}",
                result.nodes_written, result.edges_written
            );
            for warning in &result.warnings {
                println!("{} {warning}", "warning:".yellow());
            }
            if let Some(visualization) = visualization {
                println!(
                    "to visualize: open {} and run `{}`",
                    visualization.browser_url, visualization.query
                );
            }
        }
        GraphOutcome::Failed { .. } => {}
    }
    if let RunStatus::Degraded { reasons } = &outcome.status {
        for reason in reasons {
            println!("{} {reason}", "degraded:".yellow());
        }
    }
}

/// Parses the command line and runs the selected command.
///
/// # Errors
/// Returns an error when the configuration or the ontology cannot be loaded,
/// or the report cannot be written.
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    let environment: Environment = cli.environment.unwrap_or_else(resolve_from_env).into();

    let mut config = match &cli.config {
        Some(folder) => environment.load_from_folder(folder)?,
        None => environment.load()?,
    };
    logger::init(&config.logger)?;

    match cli.command {
        Commands::Run { dry_run, output } => {
            let outcome = Workflow::new(&config).dry_run(dry_run).run().await?;
            let path = output.unwrap_or_else(|| config.report.path.clone());
            ReportWriter::new(&config.report.title).write(&outcome, &path)?;
            print_status(&outcome);
            println!("report generated: {}", path.display());
        }
        Commands::Metrics { json } => {
            let workflow = Workflow::new(&config);
            let model = workflow.load()?;
            let (metrics, _) = workflow.measure(&model);
            if json {
                println!("{}", serde_json::to_string_pretty(&metrics)?);
            } else {
                for (caption, value) in metrics.rows() {
                    println!("{caption:<36}{value:>8}");
                }
            }
        }
        Commands::Query {
            term,
            regex,
            case_sensitive,
        } => {
            if let Some(pattern) = pattern_override(term, regex, case_sensitive) {
                config.query.pattern = pattern;
            }
            let workflow = Workflow::new(&config);
            let model = workflow.load()?;
            let outcome = workflow.query(&model);
            if let Some(warning) = &outcome.warning {
                println!("{} {warning}", "warning:".yellow());
            }
            if outcome.matches.is_empty() {
                println!("No matching terms found.");
            }
            for found in &outcome.matches {
                println!("{}\t{}", found.class.as_str().green(), found.label);
            }
        }
        Commands::Sync {
            dry_run,
            all_classes,
        } => {
            if all_classes {
                config.graph.local_only = false;
            }
            config.graph.enable = true;
            let outcome = Workflow::new(&config).dry_run(dry_run).run().await?;
            print_status(&outcome);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn term_wins_over_default_pattern() {
        assert_eq!(
            pattern_override(Some("filler".into()), None, false),
            Some(LabelPattern::contains("filler"))
        );
        assert_eq!(
            pattern_override(None, Some("^Nat".into()), false),
            Some(LabelPattern::Regex {
                pattern: "^Nat".into()
            })
        );
        assert_eq!(pattern_override(None, None, false), None);
    }

    #[test]
    fn parses_sync_flags() {
        let cli = Cli::parse_from(["ontoscope", "sync", "--dry-run", "--all-classes"]);
        assert!(matches!(
            cli.command,
            Commands::Sync {
                dry_run: true,
                all_classes: true
            }
        ));
    }
}
