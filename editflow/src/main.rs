//! Streaming file-edit pipeline CLI.
//!
//! Writes whole-file content into a workspace through the same edit session,
//! approval gate and diagnostics reporting an agent host would use. Config
//! lives at `.editflow/config.toml` under the workspace root.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use editflow::core::mistakes::TaskCounters;
use editflow::core::types::{EditOutcome, OutcomeKind, WriteFileRequest};
use editflow::exit_codes;
use editflow::io::access::IgnoreFileAccess;
use editflow::io::approval::{Approver, AutoApprove, PromptApprover};
use editflow::io::config::{EditConfig, config_path, load_config, write_config};
use editflow::io::strategy::StrategySet;
use editflow::logging;
use editflow::orchestrator::{Collaborators, DiffOrchestrator};

#[derive(Parser)]
#[command(
    name = "editflow",
    version,
    about = "Apply agent-proposed file edits with approval and rollback"
)]
struct Cli {
    /// Workspace root; paths are resolved against it.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.editflow/config.toml` with defaults if missing.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Load and validate the config.
    Validate,
    /// Write the contents of `--from` to `path` inside the workspace.
    Write {
        /// Target path relative to the workspace root.
        path: String,
        /// File holding the new content.
        #[arg(long)]
        from: PathBuf,
        /// Approve without prompting.
        #[arg(short, long)]
        yes: bool,
        /// Print the structured outcome as JSON instead of the tool result.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    logging::init();
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = std::fs::canonicalize(&cli.root)
        .with_context(|| format!("resolve workspace root {}", cli.root.display()))?;
    match cli.command {
        Command::Init { force } => cmd_init(&root, force),
        Command::Validate => cmd_validate(&root),
        Command::Write {
            path,
            from,
            yes,
            json,
        } => cmd_write(&root, path, &from, yes, json).await,
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let path = config_path(root);
    if !force && path.exists() {
        return Ok(exit_codes::OK);
    }
    write_config(&path, &EditConfig::default())?;
    Ok(exit_codes::OK)
}

fn cmd_validate(root: &Path) -> Result<i32> {
    let path = config_path(root);
    load_config(&path).with_context(|| format!("invalid config {}", path.display()))?;
    IgnoreFileAccess::load(root, &[])?;
    Ok(exit_codes::OK)
}

async fn cmd_write(root: &Path, path: String, from: &Path, yes: bool, json: bool) -> Result<i32> {
    let config = load_config(&config_path(root))?;
    let content = tokio::fs::read_to_string(from)
        .await
        .with_context(|| format!("read {}", from.display()))?;

    let access = IgnoreFileAccess::load(root, &config.access.deny)?;
    let approver: Arc<dyn Approver> = if yes {
        Arc::new(AutoApprove)
    } else {
        Arc::new(PromptApprover)
    };
    // The CLI only writes whole files, so no diff strategies are registered.
    let orchestrator = DiffOrchestrator::from_config(
        root,
        &config,
        &StrategySet::new(),
        Collaborators {
            access: Arc::new(access),
            approver,
            ..Collaborators::headless()
        },
        Arc::new(TaskCounters::new()),
    );

    let outcome = orchestrator
        .write_file(WriteFileRequest::new(path, content))
        .await;
    if json {
        let payload = serde_json::to_string_pretty(&outcome).context("serialize outcome")?;
        println!("{payload}");
    } else {
        print!("{}", outcome.tool_result);
    }
    Ok(exit_code(&outcome))
}

fn exit_code(outcome: &EditOutcome) -> i32 {
    match outcome.kind {
        OutcomeKind::Applied { .. } | OutcomeKind::Progress => exit_codes::OK,
        OutcomeKind::Rejected => exit_codes::REJECTED,
        OutcomeKind::Failed(_) => exit_codes::FAILED,
    }
}
