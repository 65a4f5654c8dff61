use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vgraph::asset::loader::{load_blueprint, load_document};
use vgraph::runtime::registry::NodeRegistry;
use vgraph::runtime::blueprint::PruneReport;
use vgraph::{Blueprint, Evaluator, EvaluatorConfig, EvaluatorState};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Step one or more instances of a blueprint until they finish
    Run {
        /// Path to the blueprint file (YAML, or JSON by `.json` extension)
        #[arg(long, short)]
        file: PathBuf,

        /// Number of concurrent instances
        #[arg(long, short = 'n', default_value_t = 1)]
        instances: usize,

        /// Scripted answers for choice nodes, in order (e.g. -c 0,1)
        #[arg(long, short = 'c', value_delimiter = ',')]
        choices: Vec<usize>,

        /// Milliseconds between ticks
        #[arg(long, default_value_t = 10)]
        tick_ms: u64,

        /// Stop after this many ticks even if instances are still running
        #[arg(long, default_value_t = 10_000)]
        max_ticks: usize,

        /// Maximum pending continuations per instance
        #[arg(long, default_value_t = EvaluatorConfig::default().continuation_limit)]
        continuation_limit: usize,
    },

    /// Print the nodes, ports and links of a blueprint
    Inspect {
        /// Path to the blueprint file (YAML, or JSON by `.json` extension)
        #[arg(long, short)]
        file: PathBuf,
    },
}

struct Session {
    evaluator: Evaluator,
    choices: VecDeque<usize>,
}

impl Session {
    /// Feeds the next scripted answer when parked on a choice node.
    fn answer_choice(&mut self) -> Result<()> {
        let EvaluatorState::Suspended(node) = self.evaluator.state() else {
            return Ok(());
        };
        let is_choice = self
            .evaluator
            .blueprint()
            .node(node)
            .is_some_and(|entry| entry.kind() == "choice");
        if !is_choice {
            return Ok(());
        }
        let Some(graph) = self.evaluator.graph() else {
            return Ok(());
        };
        match self.choices.pop_front() {
            Some(choice) => graph.set_value(node, "selected", choice)?,
            None => warn!(instance = %graph.id(), %node, "no scripted choice left"),
        }
        Ok(())
    }

    fn print_line(&self) {
        let (Some(graph), Some(node)) = (self.evaluator.graph(), self.evaluator.previous()) else {
            return;
        };
        let is_dialogue = self
            .evaluator
            .blueprint()
            .node(node)
            .is_some_and(|entry| entry.kind() == "dialogue");
        if is_dialogue {
            if let Ok(line) = graph.value_as::<String>(node, "line") {
                println!("[{}] {}", graph.id(), line);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();
    let registry = NodeRegistry::with_builtins();

    match cli.command {
        Commands::Run {
            file,
            instances,
            choices,
            tick_ms,
            max_ticks,
            continuation_limit,
        } => {
            let blueprint = Arc::new(load_blueprint(&file, &registry)?);
            let config = EvaluatorConfig { continuation_limit };

            let mut sessions = Vec::with_capacity(instances);
            for _ in 0..instances {
                let mut evaluator = Evaluator::with_config(Arc::clone(&blueprint), config.clone());
                evaluator.initialize()?;
                sessions.push(Session {
                    evaluator,
                    choices: choices.iter().copied().collect(),
                });
            }
            info!(blueprint = blueprint.id(), instances, "running");

            let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));
            let mut ticks = 0;
            while sessions.iter().any(|s| !s.evaluator.is_finished()) {
                if ticks >= max_ticks {
                    warn!(ticks, "tick limit reached, stopping");
                    break;
                }
                interval.tick().await;
                ticks += 1;

                for session in sessions.iter_mut().filter(|s| !s.evaluator.is_finished()) {
                    session.answer_choice()?;
                    match session.evaluator.step() {
                        Ok(_) => session.print_line(),
                        Err(e) => {
                            error!(instance = ?session.evaluator.instance(), error = %e, "step failed, releasing instance");
                            session.evaluator.release();
                        }
                    }
                }
                sessions.retain(|s| s.evaluator.state() != EvaluatorState::Idle);
            }
            info!(ticks, live = blueprint.live_instances().len(), "run finished");
        }

        Commands::Inspect { file } => {
            let document = load_document(&file)?;
            let (blueprint, report) = Blueprint::from_document(document, &registry)?;
            print_blueprint(&blueprint, &report);
        }
    }

    Ok(())
}

fn print_blueprint(blueprint: &Blueprint, report: &PruneReport) {
    println!("{} ({})", blueprint.id(), blueprint.name());
    match blueprint.root() {
        Some(root) => println!("root: {}", root),
        None => println!("root: <none>"),
    }
    for entry in blueprint.nodes() {
        println!("{} '{}' [{}]", entry.id(), entry.label(), entry.kind());
        for port in entry.ports() {
            let arity = match port.sub_port_count() {
                Some(n) => format!(" x{}", n),
                None => String::new(),
            };
            println!(
                "  {:?} {} : {}{} ({} links)",
                port.direction(),
                port.field(),
                port.value_type(),
                arity,
                port.link_count()
            );
            for link in port.links() {
                println!("    {} -> {}.{}", link.id(), link.target_node(), link.target_field());
            }
        }
    }
    if !report.is_empty() {
        println!("pruned links:");
        for pruned in &report.removed {
            println!(
                "  {} {}.{} -> {}.{}",
                pruned.id, pruned.owner, pruned.field, pruned.target_node, pruned.target_field
            );
        }
    }
}
