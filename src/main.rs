//! agentpipe: run a coding agent and stream its events as JSON lines.
//!
//! The task comes from `AGENT_TASK` (or `--task-file`), images from
//! `AGENT_IMAGES`, the credential from `ANTHROPIC_API_KEY`.
//!
//!   AGENT_TASK="fix the failing test" agentpipe --cwd ./repo > events.jsonl
//!
//! When the agent asks the user a question, answer it from another shell:
//!
//!   agentpipe-answer <tool_use_id> -a "Which database?=Postgres"

use agentpipe::cli;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;

/// Run a coding agent on a task and stream its events to stdout.
#[derive(Parser)]
#[command(
    name = "agentpipe",
    version,
    about = "Run a coding agent and stream its events as JSON lines",
    long_about = "Reads the task from AGENT_TASK (or --task-file), optional images from\n\
                  AGENT_IMAGES, and the credential from ANTHROPIC_API_KEY.\n\n\
                  Every agent event is printed to stdout as one JSON line. Questions the\n\
                  agent asks the user are answered by dropping <tool_use_id>.json into\n\
                  the scratch directory (see agentpipe-answer)."
)]
struct Cli {
    /// Text appended to the agent's system prompt
    #[arg(long, value_name = "TEXT")]
    append_system_prompt: Option<String>,

    /// Working directory for the agent (default: current directory)
    #[arg(long, value_name = "DIR")]
    cwd: Option<PathBuf>,

    /// Continue the most recent conversation
    #[arg(long = "continue")]
    continue_conversation: bool,

    /// Resume a session by id
    #[arg(long, value_name = "SESSION_ID")]
    resume: Option<String>,

    /// Read the task from a file instead of AGENT_TASK
    #[arg(long, value_name = "PATH")]
    task_file: Option<PathBuf>,

    /// Settings file (default: .agentpipe.yaml, searched upward)
    #[arg(long, env = "AGENTPIPE_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Agent CLI executable
    #[arg(long, env = "AGENTPIPE_CLI", value_name = "PATH")]
    cli_path: Option<PathBuf>,

    /// Directory answer files are read from
    #[arg(long, env = "AGENTPIPE_SCRATCH_DIR", value_name = "DIR")]
    scratch_dir: Option<PathBuf>,

    /// Append every permission decision to this JSONL file
    #[arg(long, value_name = "PATH")]
    decision_log: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    // stdout carries events only; all diagnostics go to stderr
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("agentpipe=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    let options = cli::run::RunOptions {
        cwd: cli.cwd,
        append_system_prompt: cli.append_system_prompt,
        continue_conversation: cli.continue_conversation,
        resume: cli.resume,
        task_file: cli.task_file,
        config: cli.config,
        cli_path: cli.cli_path,
        scratch_dir: cli.scratch_dir,
        decision_log: cli.decision_log,
    };

    if let Err(e) = cli::run::run_task(options).await {
        eprintln!();
        eprintln!("  {} {}", "✗".red().bold(), e);
        for cause in e.chain().skip(1) {
            eprintln!("  {} {}", "caused by:".dimmed(), cause);
        }
        eprintln!();
        std::process::exit(1);
    }
}
