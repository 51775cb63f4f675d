//! YAML settings file.
//!
//! Optional. Looked up as `--config`, then `.agentpipe.yaml` walking up
//! from the working directory, then `~/.config/agentpipe/config.yaml`.
//!
//! # Example
//! ```yaml
//! cli_path: claude
//! allowed_tools: [Read, Edit, Bash, AskUserQuestion]
//! permission_mode: acceptEdits
//! approval:
//!   tool: AskUserQuestion
//!   scratch_dir: /tmp/agentpipe-answers
//!   poll_interval_ms: 500
//!   timeout_ms: 10000
//! decision_log: ~/.agentpipe/decisions.jsonl
//! ```

use crate::approval::gate::{DEFAULT_INTERACTIVE_TOOL, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};
use crate::approval::GateConfig;
use crate::driver::PermissionMode;
use crate::utils::paths::{expand_home, find_upwards};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SETTINGS_FILE_NAME: &str = ".agentpipe.yaml";

/// Tools the agent may use unless the settings file says otherwise.
pub const DEFAULT_ALLOWED_TOOLS: &[&str] = &[
    "Read",
    "Write",
    "Edit",
    "MultiEdit",
    "Bash",
    "Glob",
    "Grep",
    "LS",
    "WebFetch",
    "WebSearch",
    "TodoWrite",
    "NotebookEdit",
    "Task",
    "AskUserQuestion",
];

/// Parsed settings file. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cli_path: Option<PathBuf>,
    pub model: Option<String>,
    pub allowed_tools: Option<Vec<String>>,
    pub permission_mode: Option<PermissionMode>,
    pub approval: ApprovalSettings,
    pub decision_log: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApprovalSettings {
    pub tool: Option<String>,
    pub scratch_dir: Option<PathBuf>,
    pub poll_interval_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}

impl Settings {
    pub fn parse_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings =
            serde_yaml::from_str(yaml).context("Failed to parse settings YAML")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn parse_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        Self::parse_str(&content)
            .with_context(|| format!("Invalid settings file: {}", path.display()))
    }

    /// Load from an explicit path, or discover one. No file means defaults.
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::parse_file(&expand_home(path));
        }
        match Self::discover(cwd) {
            Some(path) => {
                tracing::debug!("Using settings file {}", path.display());
                Self::parse_file(&path)
            }
            None => Ok(Self::default()),
        }
    }

    fn discover(cwd: &Path) -> Option<PathBuf> {
        find_upwards(cwd, SETTINGS_FILE_NAME).or_else(|| {
            let global = dirs::config_dir()?.join("agentpipe").join("config.yaml");
            global.is_file().then_some(global)
        })
    }

    fn validate(&self) -> Result<()> {
        if self.approval.poll_interval_ms == Some(0) {
            bail!("approval.poll_interval_ms must be greater than zero");
        }
        if let Some(tool) = &self.approval.tool {
            if tool.trim().is_empty() {
                bail!("approval.tool must not be empty");
            }
        }
        Ok(())
    }

    pub fn allowed_tools(&self) -> Vec<String> {
        match &self.allowed_tools {
            Some(tools) => tools.clone(),
            None => DEFAULT_ALLOWED_TOOLS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Gate settings, with an optional scratch directory override on top.
    pub fn gate_config(&self, scratch_override: Option<&Path>) -> GateConfig {
        let scratch_dir = scratch_override
            .map(Path::to_path_buf)
            .or_else(|| self.approval.scratch_dir.clone())
            .map(|p| expand_home(&p))
            .unwrap_or_else(GateConfig::default_scratch_dir);

        GateConfig {
            interactive_tool: self
                .approval
                .tool
                .clone()
                .unwrap_or_else(|| DEFAULT_INTERACTIVE_TOOL.to_string()),
            scratch_dir,
            poll_interval: self
                .approval
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            timeout: self
                .approval
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_TIMEOUT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_is_default() {
        let settings = Settings::parse_str("").unwrap();
        assert!(settings.cli_path.is_none());
        assert_eq!(settings.allowed_tools().len(), DEFAULT_ALLOWED_TOOLS.len());

        let gate = settings.gate_config(None);
        assert_eq!(gate.interactive_tool, "AskUserQuestion");
        assert_eq!(gate.poll_interval, Duration::from_millis(500));
        assert_eq!(gate.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_full_settings() {
        let yaml = r#"
cli_path: /opt/agent/bin/claude
model: opus
allowed_tools: [Read, AskUserQuestion]
permission_mode: acceptEdits
approval:
  tool: AskHuman
  scratch_dir: /var/tmp/answers
  poll_interval_ms: 100
  timeout_ms: 60000
decision_log: /var/log/decisions.jsonl
"#;
        let settings = Settings::parse_str(yaml).unwrap();
        assert_eq!(settings.cli_path, Some(PathBuf::from("/opt/agent/bin/claude")));
        assert_eq!(settings.model.as_deref(), Some("opus"));
        assert_eq!(settings.allowed_tools(), vec!["Read", "AskUserQuestion"]);
        assert_eq!(settings.permission_mode, Some(PermissionMode::AcceptEdits));

        let gate = settings.gate_config(None);
        assert_eq!(gate.interactive_tool, "AskHuman");
        assert_eq!(gate.scratch_dir, PathBuf::from("/var/tmp/answers"));
        assert_eq!(gate.poll_interval, Duration::from_millis(100));
        assert_eq!(gate.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_scratch_override_wins() {
        let settings =
            Settings::parse_str("approval:\n  scratch_dir: /from/file\n").unwrap();
        let gate = settings.gate_config(Some(Path::new("/from/flag")));
        assert_eq!(gate.scratch_dir, PathBuf::from("/from/flag"));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Settings::parse_str("approval:\n  poll_interval_ms: 0\n").is_err());
        assert!(Settings::parse_str("permission_mode: yolo\n").is_err());
        assert!(Settings::parse_str("approval:\n  tool: '  '\n").is_err());
    }

    #[test]
    fn test_discovers_file_in_parent() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("project").join("src");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            tmp.path().join("project").join(SETTINGS_FILE_NAME),
            "model: haiku\n",
        )
        .unwrap();

        let settings = Settings::load(None, &nested).unwrap();
        assert_eq!(settings.model.as_deref(), Some("haiku"));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(Settings::load(Some(&tmp.path().join("nope.yaml")), tmp.path()).is_err());
    }
}
