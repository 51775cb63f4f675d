//! The main flow: one task in, a stream of agent events out.
//!
//! 1. Load and validate inputs (credential, task, images), fatal on error
//! 2. Load settings and build the approval gate
//! 3. Start the agent session
//! 4. Print each event as one JSON line, in arrival order

use crate::approval::FileHandshakeGate;
use crate::audit::DecisionLogger;
use crate::config::{InputSource, Settings};
use crate::driver::{AgentOptions, AgentSession};
use crate::utils::paths::{expand_home, resolve_against};
use anyhow::{bail, Context, Result};
use futures_util::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Options for a run, straight from the command line.
#[derive(Debug, Default)]
pub struct RunOptions {
    /// Agent working directory (default: current directory)
    pub cwd: Option<PathBuf>,
    pub append_system_prompt: Option<String>,
    pub continue_conversation: bool,
    pub resume: Option<String>,
    /// Read the task from this file instead of the environment
    pub task_file: Option<PathBuf>,
    /// Explicit settings file
    pub config: Option<PathBuf>,
    pub cli_path: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
    pub decision_log: Option<PathBuf>,
}

/// Run one task to completion.
pub async fn run_task(options: RunOptions) -> Result<()> {
    let invocation_dir = std::env::current_dir().context("Could not determine current directory")?;

    let inputs = InputSource::from_env(options.task_file.clone(), invocation_dir.clone())
        .load()
        .context("Invalid run configuration")?;

    let cwd = match &options.cwd {
        Some(dir) => resolve_against(&invocation_dir, dir),
        None => invocation_dir.clone(),
    };
    if !cwd.is_dir() {
        bail!("Working directory does not exist: {}", cwd.display());
    }

    let settings = Settings::load(options.config.as_deref(), &cwd)?;

    let gate = FileHandshakeGate::new(settings.gate_config(options.scratch_dir.as_deref()))?;
    tracing::info!(
        "Answers for {} are read from {}",
        gate.config().interactive_tool,
        gate.scratch_dir().display()
    );

    let decision_log = match options.decision_log.clone().or(settings.decision_log.clone()) {
        Some(path) => {
            let logger = DecisionLogger::open(expand_home(&path))?;
            tracing::info!("Logging decisions to {}", logger.log_path().display());
            Some(logger)
        }
        None => None,
    };

    let agent_options = AgentOptions {
        cli_path: options
            .cli_path
            .clone()
            .or(settings.cli_path.clone())
            .unwrap_or_else(|| PathBuf::from("claude")),
        cwd,
        allowed_tools: settings.allowed_tools(),
        permission_mode: settings.permission_mode.unwrap_or_default(),
        model: settings.model.clone(),
        append_system_prompt: options.append_system_prompt.clone(),
        continue_conversation: options.continue_conversation,
        resume: options.resume.clone(),
    };

    let session = AgentSession::start(
        &agent_options,
        &inputs.task,
        &inputs.images,
        Arc::new(gate),
        decision_log,
    )
    .await?;

    let mut events = Box::pin(session.into_stream());
    let stdout = std::io::stdout();
    let mut count = 0usize;

    while let Some(event) = events.next().await {
        let event = event?;
        let mut out = stdout.lock();
        writeln!(out, "{}", event.to_line()).context("Failed to write event")?;
        out.flush().context("Failed to flush stdout")?;
        count += 1;
    }

    tracing::info!("Agent finished after {} event(s)", count);
    Ok(())
}
