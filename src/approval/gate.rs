//! File-handshake approval gate.
//!
//! Every tool is allowed straight through except the interactive
//! question tool. For that one we wait for a human to drop an answer
//! file into the scratch directory, then inject its answers into the
//! tool input. No answer in time (or a broken file) means deny.

use crate::approval::handoff::{self, GateError};
use crate::approval::types::{merge_answers, ApprovalDecision, ToolUseContext};
use crate::approval::ToolPermission;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Message returned to the agent whenever the question goes unanswered.
pub const NO_ANSWER_MESSAGE: &str = "No answer was provided for the question";

/// Tool that triggers the handshake unless configured otherwise.
pub const DEFAULT_INTERACTIVE_TOOL: &str = "AskUserQuestion";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Gate settings. Built from the settings file + CLI overrides.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Tool name that requires an out-of-band answer
    pub interactive_tool: String,
    /// Directory answer files are dropped into
    pub scratch_dir: PathBuf,
    /// How often to check for the answer file
    pub poll_interval: Duration,
    /// How long to wait before denying
    pub timeout: Duration,
}

impl GateConfig {
    pub fn default_scratch_dir() -> PathBuf {
        std::env::temp_dir().join("agentpipe-answers")
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            interactive_tool: DEFAULT_INTERACTIVE_TOOL.to_string(),
            scratch_dir: Self::default_scratch_dir(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Approval gate backed by answer files in a scratch directory.
pub struct FileHandshakeGate {
    config: GateConfig,
}

impl FileHandshakeGate {
    /// Create the gate, making sure the scratch directory exists.
    pub fn new(config: GateConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.scratch_dir).with_context(|| {
            format!(
                "Failed to create scratch directory: {}",
                config.scratch_dir.display()
            )
        })?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.config.scratch_dir
    }

    /// Wait for, claim and parse the answer file for one tool use.
    async fn await_answers(
        &self,
        tool_use_id: &str,
    ) -> Result<BTreeMap<String, String>, GateError> {
        let path = handoff::answer_path(&self.config.scratch_dir, tool_use_id)?;

        tracing::debug!("Waiting for answer file {}", path.display());
        tokio::time::timeout(
            self.config.timeout,
            wait_for_file(&path, self.config.poll_interval),
        )
        .await
        .map_err(|_| GateError::TimedOut {
            path: path.clone(),
            timeout: self.config.timeout,
        })?;

        handoff::claim_answers(&path).await
    }
}

#[async_trait]
impl ToolPermission for FileHandshakeGate {
    async fn can_use_tool(
        &self,
        tool_name: &str,
        input: Value,
        context: &ToolUseContext,
    ) -> ApprovalDecision {
        if tool_name != self.config.interactive_tool {
            return ApprovalDecision::allow(input);
        }

        match self.await_answers(&context.tool_use_id).await {
            Ok(answers) => {
                tracing::info!(
                    "Got {} answer(s) for {}",
                    answers.len(),
                    context.tool_use_id
                );
                ApprovalDecision::allow(merge_answers(input, answers))
            }
            Err(e) => {
                tracing::warn!(
                    "Denying {} ({}): {:#}",
                    tool_name,
                    context.tool_use_id,
                    anyhow::Error::new(e)
                );
                ApprovalDecision::deny(NO_ANSWER_MESSAGE)
            }
        }
    }
}

/// Resolve once `path` exists, checking every `interval`.
async fn wait_for_file(path: &Path, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            return;
        }
    }
}
