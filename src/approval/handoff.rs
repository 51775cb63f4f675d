//! Answer-file handoff on disk.
//!
//! An external actor drops `{scratch_dir}/{tool_use_id}.json`; the gate
//! claims it by renaming to `{tool_use_id}.claimed`, reads it, and deletes
//! the claimed copy. Writers go through a temp file + rename so the gate
//! never observes a half-written answer.

use crate::approval::types::AnswerFile;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Everything that can go wrong between "waiting" and "answer in hand".
#[derive(Debug, Error)]
pub enum GateError {
    #[error("invalid tool use id {0:?}")]
    InvalidToolUseId(String),

    #[error("no answer file at {path} after {timeout:?}")]
    TimedOut { path: PathBuf, timeout: Duration },

    #[error("failed to claim answer file {path}")]
    Claim {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read answer file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("answer file {path} is not valid")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to delete answer file {path}")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reject ids that could escape the scratch directory.
pub fn validate_tool_use_id(tool_use_id: &str) -> Result<(), GateError> {
    let bad = tool_use_id.is_empty()
        || tool_use_id.contains('/')
        || tool_use_id.contains('\\')
        || tool_use_id.contains('\0')
        || tool_use_id.contains("..");
    if bad {
        return Err(GateError::InvalidToolUseId(tool_use_id.to_string()));
    }
    Ok(())
}

/// Path where the answer for `tool_use_id` is expected.
pub fn answer_path(scratch_dir: &Path, tool_use_id: &str) -> Result<PathBuf, GateError> {
    validate_tool_use_id(tool_use_id)?;
    Ok(scratch_dir.join(format!("{}.json", tool_use_id)))
}

fn claimed_path(answer_path: &Path) -> PathBuf {
    answer_path.with_extension("claimed")
}

/// Take ownership of an answer file and return its answers.
/// The file is gone afterwards, whether or not it parsed.
pub async fn claim_answers(path: &Path) -> Result<BTreeMap<String, String>, GateError> {
    let claimed = claimed_path(path);
    tokio::fs::rename(path, &claimed)
        .await
        .map_err(|source| GateError::Claim {
            path: path.to_path_buf(),
            source,
        })?;

    let read = tokio::fs::read(&claimed).await;
    settle_claim(path, &claimed, read).await
}

/// Parse what was read from the claimed file, then delete it.
/// A failed delete is an error even when the answers parsed.
async fn settle_claim(
    path: &Path,
    claimed: &Path,
    read: std::io::Result<Vec<u8>>,
) -> Result<BTreeMap<String, String>, GateError> {
    let parsed = match read {
        Ok(bytes) => serde_json::from_slice::<AnswerFile>(&bytes).map_err(|source| {
            GateError::Parse {
                path: path.to_path_buf(),
                source,
            }
        }),
        Err(source) => Err(GateError::Read {
            path: path.to_path_buf(),
            source,
        }),
    };

    let removed = tokio::fs::remove_file(claimed).await;
    let answers = parsed?.answers;
    removed.map_err(|source| GateError::Delete {
        path: claimed.to_path_buf(),
        source,
    })?;

    Ok(answers)
}

/// Staging name used while an answer file is being written.
fn staging_path(scratch_dir: &Path, tool_use_id: &str) -> PathBuf {
    scratch_dir.join(format!("{}.json.tmp", tool_use_id))
}

/// Atomically publish an answer file for `tool_use_id`.
/// Used by `agentpipe-answer` and by tests standing in for a human.
pub fn write_answer_file(
    scratch_dir: &Path,
    tool_use_id: &str,
    answers: &BTreeMap<String, String>,
) -> anyhow::Result<PathBuf> {
    use anyhow::Context;

    let path = answer_path(scratch_dir, tool_use_id)?;
    std::fs::create_dir_all(scratch_dir).with_context(|| {
        format!("Failed to create scratch directory: {}", scratch_dir.display())
    })?;

    let body = serde_json::to_vec(&AnswerFile {
        answers: answers.clone(),
    })?;
    let tmp = staging_path(scratch_dir, tool_use_id);
    std::fs::write(&tmp, body)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, &path)
        .with_context(|| format!("Failed to publish {}", path.display()))?;

    Ok(path)
}
