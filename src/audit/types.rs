//! Types for the decision log.
//!
//! One record per permission request the agent sent us, whichever way it went.

use crate::approval::types::ApprovalDecision;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single line in the decision log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// When the decision was returned to the agent
    pub timestamp: DateTime<Utc>,

    /// Agent session, once the agent has announced it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Tool the agent asked to run
    pub tool_name: String,

    /// Tool-use identifier (names the answer file for interactive tools)
    pub tool_use_id: String,

    /// "allow" or "deny"
    pub decision: String,

    /// Deny message, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Time spent deciding (milliseconds)
    pub elapsed_ms: u64,
}

impl DecisionRecord {
    pub fn new(
        session_id: Option<String>,
        tool_name: &str,
        tool_use_id: &str,
        decision: &ApprovalDecision,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            session_id,
            tool_name: tool_name.to_string(),
            tool_use_id: tool_use_id.to_string(),
            decision: decision.label().to_string(),
            message: match decision {
                ApprovalDecision::Deny { message } => Some(message.clone()),
                ApprovalDecision::Allow { .. } => None,
            },
            elapsed_ms,
        }
    }
}
