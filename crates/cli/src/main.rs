use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{Level, warn};

use galley_api::{CoordinatorClient, StartExecutionRequest, StartOutcome, start_execution};
use galley_engine::{ExecutionState, WorkflowRegistry, emit, load_template_file, plan};
use galley_types::HistoryPage;

#[derive(Parser)]
#[command(name = "galley", about = "Publication pipeline workflow tooling")]
struct Cli {
    /// Extra workflow template file registered alongside the built-ins.
    #[arg(long, global = true)]
    templates: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start an execution of a registered workflow.
    Start {
        /// Workflow type name.
        #[arg(long)]
        workflow: String,
        /// Caller-chosen execution identifier; starting twice with the same
        /// identifier is a no-op.
        #[arg(long)]
        execution_id: String,
        /// Path to a JSON run input file; null input when omitted.
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Compute the decision for a history snapshot, without the coordinator.
    Decide {
        /// Workflow type name.
        #[arg(long)]
        workflow: String,
        /// Path to a JSON file holding history pages (an array or one page).
        #[arg(long)]
        history: PathBuf,
        /// Path to a JSON run input file; null input when omitted.
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Inspect registered workflows.
    Workflows {
        #[command(subcommand)]
        command: WorkflowsCommand,
    },
}

#[derive(Subcommand)]
enum WorkflowsCommand {
    /// List registered workflow types.
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let registry = build_registry(cli.templates.as_deref())?;

    match cli.command {
        Command::Start {
            workflow,
            execution_id,
            input,
        } => run_start(&registry, &workflow, &execution_id, input.as_deref()).await,
        Command::Decide {
            workflow,
            history,
            input,
        } => run_decide(&registry, &workflow, &history, input.as_deref()),
        Command::Workflows {
            command: WorkflowsCommand::List,
        } => run_list(&registry),
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .try_init();
}

fn build_registry(extra_templates: Option<&Path>) -> Result<WorkflowRegistry> {
    let mut registry = WorkflowRegistry::with_builtins()?;
    if let Some(path) = extra_templates {
        let bundle = load_template_file(path)?;
        for (_, template) in bundle.templates {
            registry.register(template)?;
        }
    }
    Ok(registry)
}

fn read_json(path: Option<&Path>) -> Result<serde_json::Value> {
    match path {
        Some(path) => {
            let content =
                std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
        }
        None => Ok(serde_json::Value::Null),
    }
}

/// Reads a history file holding either an array of pages or a single page.
fn read_history(path: &Path) -> Result<Vec<HistoryPage>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    if let Ok(pages) = serde_json::from_str::<Vec<HistoryPage>>(&content) {
        return Ok(pages);
    }
    let page = serde_json::from_str::<HistoryPage>(&content)
        .with_context(|| format!("invalid history document in {}", path.display()))?;
    Ok(vec![page])
}

async fn run_start(
    registry: &WorkflowRegistry,
    workflow: &str,
    execution_id: &str,
    input_path: Option<&Path>,
) -> Result<()> {
    let input = read_json(input_path)?;
    let definition = registry.definition_for(workflow, input)?;
    let request = StartExecutionRequest::for_definition(&definition, execution_id);

    let client = CoordinatorClient::new_from_env()?;
    match start_execution(&client, &request).await? {
        StartOutcome::Started(started) => {
            let run_id = started.run_id.as_deref().unwrap_or("-");
            println!("started {workflow} execution '{execution_id}' (run {run_id})");
        }
        StartOutcome::AlreadyRunning => {
            println!("execution '{execution_id}' is already running");
        }
    }
    Ok(())
}

fn run_decide(registry: &WorkflowRegistry, workflow: &str, history_path: &Path, input_path: Option<&Path>) -> Result<()> {
    let input = read_json(input_path)?;
    let definition = registry.definition_for(workflow, input)?;
    let pages = read_history(history_path)?;

    if let Some(last) = pages.last()
        && last.next_page_token.is_some()
    {
        warn!("history file ends with a continuation token; the decision below is based on a truncated view");
    }

    let state = ExecutionState::reduce(&definition, &pages)?;
    let records = emit(&plan(&definition, &state), &definition);
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn run_list(registry: &WorkflowRegistry) -> Result<()> {
    for name in registry.names() {
        let Some(template) = registry.template(name) else {
            continue;
        };
        let description = template.description.as_deref().unwrap_or("");
        println!("{name}\tv{}\t{} step(s)\t{description}", template.version, template.steps.len());
    }
    Ok(())
}
