//! Decision log writer: append-only JSONL.
//!
//! Flushes after every write so a killed run still leaves a usable log.

use crate::audit::types::DecisionRecord;
use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only writer for gate decisions.
pub struct DecisionLogger {
    log_path: PathBuf,
    file: File,
    entry_count: usize,
}

impl DecisionLogger {
    /// Open (or create) the log at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let log_path = path.as_ref().to_path_buf();
        if let Some(parent) = log_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create log directory: {}", parent.display())
                })?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open decision log: {}", log_path.display()))?;

        Ok(Self {
            log_path,
            file,
            entry_count: 0,
        })
    }

    pub fn log(&mut self, record: &DecisionRecord) -> Result<()> {
        let json = serde_json::to_string(record).context("Failed to serialize decision")?;
        writeln!(self.file, "{}", json).context("Failed to write decision")?;
        self.file.flush().context("Failed to flush decision log")?;
        self.entry_count += 1;
        Ok(())
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Number of records written by this logger.
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }
}
