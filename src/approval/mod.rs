pub mod gate;
pub mod handoff;
pub mod types;

use crate::approval::types::{ApprovalDecision, ToolUseContext};
use async_trait::async_trait;
use serde_json::Value;

pub use gate::{FileHandshakeGate, GateConfig};
pub use types::AnswerFile;

/// Decides whether the agent may run a tool.
/// Implementations must always produce a decision; failures become denials.
#[async_trait]
pub trait ToolPermission {
    async fn can_use_tool(
        &self,
        tool_name: &str,
        input: Value,
        context: &ToolUseContext,
    ) -> ApprovalDecision;
}
