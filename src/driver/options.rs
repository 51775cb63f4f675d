//! What we ask the agent to do, and how.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// How the agent treats tool permissions on its side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    #[default]
    #[value(name = "default")]
    Default,
    #[value(name = "acceptEdits")]
    AcceptEdits,
    #[value(name = "bypassPermissions")]
    BypassPermissions,
    #[value(name = "plan")]
    Plan,
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionMode::Default => write!(f, "default"),
            PermissionMode::AcceptEdits => write!(f, "acceptEdits"),
            PermissionMode::BypassPermissions => write!(f, "bypassPermissions"),
            PermissionMode::Plan => write!(f, "plan"),
        }
    }
}

/// Image formats the agent accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/gif")]
    Gif,
    #[serde(rename = "image/webp")]
    Webp,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Gif => "image/gif",
            MediaType::Webp => "image/webp",
        }
    }
}

/// An image descriptor as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAttachment {
    pub path: PathBuf,
    pub media_type: MediaType,
}

/// An image that has been read from disk and is ready to send.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub media_type: MediaType,
    /// Base64 of the raw file bytes
    pub data: String,
}

impl LoadedImage {
    pub fn from_bytes(media_type: MediaType, bytes: &[u8]) -> Self {
        Self {
            media_type,
            data: BASE64.encode(bytes),
        }
    }
}

/// Everything needed to start one agent run.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Agent CLI executable
    pub cli_path: PathBuf,
    /// Working directory for the agent
    pub cwd: PathBuf,
    /// Tools the agent may use without asking its own permission prompt
    pub allowed_tools: Vec<String>,
    pub permission_mode: PermissionMode,
    pub model: Option<String>,
    /// Appended to the agent's preset system prompt
    pub append_system_prompt: Option<String>,
    /// Continue the most recent conversation in `cwd`
    pub continue_conversation: bool,
    /// Resume a specific session
    pub resume: Option<String>,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            cli_path: PathBuf::from("claude"),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            allowed_tools: Vec::new(),
            permission_mode: PermissionMode::Default,
            model: None,
            append_system_prompt: None,
            continue_conversation: false,
            resume: None,
        }
    }
}

impl AgentOptions {
    /// Command-line arguments for the agent CLI in streaming mode.
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "--output-format",
            "stream-json",
            "--verbose",
            "--input-format",
            "stream-json",
            "--permission-prompt-tool",
            "stdio",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if !self.allowed_tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.push(self.allowed_tools.join(","));
        }

        args.push("--permission-mode".to_string());
        args.push(self.permission_mode.to_string());

        if let Some(ref model) = self.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        if let Some(ref append) = self.append_system_prompt {
            args.push("--append-system-prompt".to_string());
            args.push(append.clone());
        }
        if self.continue_conversation {
            args.push("--continue".to_string());
        }
        if let Some(ref session) = self.resume {
            args.push("--resume".to_string());
            args.push(session.clone());
        }

        args
    }
}
