//! Types for the approval flow.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Per-invocation context the agent hands us alongside a tool request.
#[derive(Debug, Clone, Default)]
pub struct ToolUseContext {
    /// Correlates this request with its answer file
    pub tool_use_id: String,
    /// Permission updates the agent suggests (forwarded as-is, informational)
    pub suggestions: Option<Value>,
}

impl ToolUseContext {
    pub fn new(tool_use_id: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            suggestions: None,
        }
    }
}

/// The outcome returned to the agent for a single tool call.
/// Serializes to the agent's permission-result shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "behavior", rename_all = "lowercase")]
pub enum ApprovalDecision {
    Allow {
        #[serde(rename = "updatedInput")]
        updated_input: Value,
    },
    Deny {
        message: String,
    },
}

impl ApprovalDecision {
    pub fn allow(updated_input: Value) -> Self {
        ApprovalDecision::Allow { updated_input }
    }

    pub fn deny(message: impl Into<String>) -> Self {
        ApprovalDecision::Deny {
            message: message.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, ApprovalDecision::Allow { .. })
    }

    /// Short label used in logs ("allow" / "deny").
    pub fn label(&self) -> &'static str {
        match self {
            ApprovalDecision::Allow { .. } => "allow",
            ApprovalDecision::Deny { .. } => "deny",
        }
    }
}

/// Contents of an answer file: question id → answer text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerFile {
    pub answers: BTreeMap<String, String>,
}

/// Merge answers into a tool input. Non-object inputs are replaced by
/// an object carrying only the answers.
pub fn merge_answers(input: Value, answers: BTreeMap<String, String>) -> Value {
    let answers = Value::Object(
        answers
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect(),
    );
    match input {
        Value::Object(mut map) => {
            map.insert("answers".to_string(), answers);
            Value::Object(map)
        }
        _ => serde_json::json!({ "answers": answers }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decision_wire_shape() {
        let allow = ApprovalDecision::allow(json!({"q": 1}));
        assert_eq!(
            serde_json::to_value(&allow).unwrap(),
            json!({"behavior": "allow", "updatedInput": {"q": 1}})
        );

        let deny = ApprovalDecision::deny("nope");
        assert_eq!(
            serde_json::to_value(&deny).unwrap(),
            json!({"behavior": "deny", "message": "nope"})
        );
    }

    #[test]
    fn test_merge_keeps_existing_fields() {
        let mut answers = BTreeMap::new();
        answers.insert("color".to_string(), "blue".to_string());

        let merged = merge_answers(json!({"questions": ["color?"]}), answers.clone());
        assert_eq!(merged["questions"], json!(["color?"]));
        assert_eq!(merged["answers"]["color"], "blue");

        let merged = merge_answers(json!("scalar"), answers);
        assert_eq!(merged, json!({"answers": {"color": "blue"}}));
    }

    #[test]
    fn test_answer_file_requires_answers() {
        assert!(serde_json::from_str::<AnswerFile>(r#"{"other": 1}"#).is_err());
        assert!(serde_json::from_str::<AnswerFile>(r#"{"answers": {"a": 1}}"#).is_err());

        let parsed: AnswerFile =
            serde_json::from_str(r#"{"answers": {"a": "yes"}, "extra": true}"#).unwrap();
        assert_eq!(parsed.answers["a"], "yes");
    }
}
