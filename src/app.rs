/// Application setup and command dispatch
///
/// Wires configuration, registries, checkpoint storage and the workflow engine
/// together for the `ruleway` binary. Each command returns its JSON result so
/// the binary only has to print it.

use crate::{
    config::Config,
    rules::RuleSetRegistry,
    runtime::{
        checkpoint::{CheckpointStore, InMemoryCheckpointStore, SqliteCheckpointStore},
        engine::WorkflowEngine,
        instance::InstanceStatus,
        service::AdapterRegistry,
    },
    workflow::{validate, WorkflowDefinition},
};
use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::{path::{Path, PathBuf}, sync::Arc};
use tracing_subscriber::EnvFilter;

/// Workflow interpreter and rule conflict analyzer
#[derive(Debug, Parser)]
#[command(name = "ruleway", version, about = "Workflow interpreter and rule conflict analyzer")]
pub struct Cli {
    /// JSON configuration file (defaults come from RULEWAY_* environment variables)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Execute a workflow definition and print the final instance
    Run {
        /// Workflow definition JSON file
        #[arg(long)]
        workflow: PathBuf,
        /// Rule set JSON file (repeatable)
        #[arg(long = "rules")]
        rules: Vec<PathBuf>,
        /// Adapter configuration JSON file
        #[arg(long)]
        adapters: Option<PathBuf>,
        /// Initial state as inline JSON
        #[arg(long, default_value = "{}")]
        input: String,
    },

    /// Print the conflicts of every rule set in a file
    Analyze {
        /// Rule set JSON file (one set or an array of sets)
        #[arg(long)]
        rules: PathBuf,
    },

    /// Print the structural validation report of a workflow definition
    Validate {
        /// Workflow definition JSON file
        #[arg(long)]
        workflow: PathBuf,
    },
}

/// JSON result of one command
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub json: Value,
    /// False when a run failed or a definition is invalid
    pub success: bool,
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over the configured filter.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Resolve configuration from `--config` or the environment.
pub fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load_file(path),
        None => Ok(Config::default()),
    }
}

pub async fn execute(command: &Command, config: &Config) -> Result<CommandOutput> {
    match command {
        Command::Run { workflow, rules, adapters, input } => {
            run_workflow(config, workflow, rules, adapters.as_deref(), input).await
        }
        Command::Analyze { rules } => analyze_rules(rules),
        Command::Validate { workflow } => {
            let definition = read_definition(workflow)?;
            let report = validate(&definition);
            Ok(CommandOutput { success: report.is_valid(), json: serde_json::to_value(report)? })
        }
    }
}

async fn run_workflow(
    config: &Config,
    workflow: &Path,
    rules: &[PathBuf],
    adapters: Option<&Path>,
    input: &str,
) -> Result<CommandOutput> {
    let definition = read_definition(workflow)?;
    let initial_state: Value =
        serde_json::from_str(input).map_err(|e| anyhow::anyhow!("Failed to parse --input JSON: {}", e))?;

    let rule_sets = Arc::new(RuleSetRegistry::new());
    for path in rules {
        rule_sets.load_file(path)?;
    }

    let adapter_registry = Arc::new(AdapterRegistry::new());
    if let Some(path) = adapters {
        let count = adapter_registry.load_file(path)?;
        tracing::info!("📥 Loaded {} adapters from {}", count, path.display());
    }

    let checkpoints: Arc<dyn CheckpointStore> = match &config.storage.checkpoint_db {
        Some(db) => {
            tracing::info!("🗄️ Checkpointing to SQLite database {}", db);
            Arc::new(SqliteCheckpointStore::open(db).await?)
        }
        None => Arc::new(InMemoryCheckpointStore::new()),
    };

    let engine = WorkflowEngine::with_defaults(rule_sets, adapter_registry, &config.engine)
        .with_checkpoint_store(checkpoints);
    let instance = engine.execute(&definition, initial_state).await;

    Ok(CommandOutput {
        success: instance.status == InstanceStatus::Completed,
        json: serde_json::to_value(&instance)?,
    })
}

fn analyze_rules(path: &Path) -> Result<CommandOutput> {
    let registry = RuleSetRegistry::new();
    registry.load_file(path)?;

    let mut report = Map::new();
    for id in registry.list_ids() {
        let conflicts = registry.analyze(&id).unwrap_or_default();
        tracing::info!("🔍 Rule set '{}': {} conflicts", id, conflicts.len());
        report.insert(id, serde_json::to_value(conflicts)?);
    }

    Ok(CommandOutput { json: Value::Object(report), success: true })
}

fn read_definition(path: &Path) -> Result<WorkflowDefinition> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read workflow file {}: {}", path.display(), e))?;
    serde_json::from_str(&text)
        .map_err(|e| anyhow::anyhow!("Failed to parse workflow file {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_arguments() {
        let cli = Cli::parse_from([
            "ruleway", "run", "--workflow", "wf.json", "--rules", "a.json", "--rules", "b.json",
            "--input", r#"{"score":85}"#,
        ]);
        let Command::Run { workflow, rules, adapters, input } = cli.command else { panic!("expected run") };
        assert_eq!(workflow, PathBuf::from("wf.json"));
        assert_eq!(rules.len(), 2);
        assert!(adapters.is_none());
        assert_eq!(input, r#"{"score":85}"#);
    }

    #[test]
    fn input_defaults_to_empty_object() {
        let cli = Cli::parse_from(["ruleway", "run", "--workflow", "wf.json"]);
        let Command::Run { input, rules, .. } = cli.command else { panic!("expected run") };
        assert_eq!(input, "{}");
        assert!(rules.is_empty());
    }
}
