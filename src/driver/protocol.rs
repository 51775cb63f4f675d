//! Stream-JSON wire types for talking to the agent CLI.
//!
//! Both directions are newline-delimited JSON over the child's stdio.
//! We write the user turn and control responses to stdin; the agent writes
//! events (which we pass through untouched) and control requests (which we
//! answer) to stdout.

use crate::approval::types::ApprovalDecision;
use crate::driver::options::LoadedImage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message we write to the agent's stdin.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// The task itself
    User {
        message: UserMessage,
        parent_tool_use_id: Option<String>,
        session_id: String,
    },
    /// A request we initiate (only `initialize` today)
    ControlRequest { request_id: String, request: Value },
    /// Our answer to one of the agent's control requests
    ControlResponse { response: ControlResponse },
}

impl Outbound {
    pub fn initialize(request_id: impl Into<String>) -> Self {
        Outbound::ControlRequest {
            request_id: request_id.into(),
            request: serde_json::json!({ "subtype": "initialize" }),
        }
    }

    /// The opening user turn: task text followed by any images.
    pub fn task(text: &str, images: &[LoadedImage]) -> Self {
        let mut content = vec![ContentBlock::Text {
            text: text.to_string(),
        }];
        content.extend(images.iter().map(|image| ContentBlock::Image {
            source: ImageSource::Base64 {
                media_type: image.media_type.as_str().to_string(),
                data: image.data.clone(),
            },
        }));

        Outbound::User {
            message: UserMessage {
                role: "user".to_string(),
                content,
            },
            parent_tool_use_id: None,
            session_id: "default".to_string(),
        }
    }

    pub fn permission(request_id: impl Into<String>, decision: &ApprovalDecision) -> Self {
        Outbound::ControlResponse {
            response: ControlResponse::Success {
                request_id: request_id.into(),
                // ApprovalDecision is a plain tagged enum; this cannot fail
                response: serde_json::to_value(decision).unwrap_or(Value::Null),
            },
        }
    }

    pub fn unsupported(request_id: impl Into<String>, subtype: &str) -> Self {
        Outbound::ControlResponse {
            response: ControlResponse::Error {
                request_id: request_id.into(),
                error: format!("unsupported control request: {}", subtype),
            },
        }
    }

    pub fn malformed(request_id: impl Into<String>, error: &str) -> Self {
        Outbound::ControlResponse {
            response: ControlResponse::Error {
                request_id: request_id.into(),
                error: format!("malformed can_use_tool request: {}", error),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserMessage {
    pub role: String,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    Base64 { media_type: String, data: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum ControlResponse {
    Success { request_id: String, response: Value },
    Error { request_id: String, error: String },
}

/// A `can_use_tool` control request: the agent wants to run a tool.
#[derive(Debug, Clone, Deserialize)]
pub struct PermissionRequest {
    pub request_id: String,
    pub request: CanUseTool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanUseTool {
    pub tool_name: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub tool_use_id: Option<String>,
    #[serde(default)]
    pub permission_suggestions: Option<Value>,
}

impl PermissionRequest {
    /// Id used to find the answer file. Older agents omit `tool_use_id`.
    pub fn tool_use_id(&self) -> &str {
        self.request
            .tool_use_id
            .as_deref()
            .unwrap_or(&self.request_id)
    }
}

/// One line read from the agent's stdout, classified.
#[derive(Debug, Clone)]
pub enum Inbound {
    Permission(PermissionRequest),
    /// Any control request we do not handle; answered with an error
    OtherControlRequest {
        request_id: Option<String>,
        subtype: String,
    },
    /// A `can_use_tool` request we could not decode
    MalformedPermission {
        request_id: Option<String>,
        error: String,
    },
    ControlResponse(Value),
    ControlCancel(Value),
    Event(AgentEvent),
}

impl Inbound {
    /// Classify a stdout line. Returns `None` for lines that are not JSON objects.
    pub fn parse(line: &str) -> Option<Inbound> {
        let value: Value = serde_json::from_str(line).ok()?;
        if !value.is_object() {
            return None;
        }

        let kind = value.get("type").and_then(Value::as_str).unwrap_or("");
        let inbound = match kind {
            "control_request" => {
                let subtype = value
                    .pointer("/request/subtype")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                let request_id = value
                    .get("request_id")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                if subtype != "can_use_tool" {
                    return Some(Inbound::OtherControlRequest {
                        request_id,
                        subtype,
                    });
                }
                match serde_json::from_value::<PermissionRequest>(value) {
                    Ok(request) => Inbound::Permission(request),
                    Err(e) => Inbound::MalformedPermission {
                        request_id,
                        error: e.to_string(),
                    },
                }
            }
            "control_response" => Inbound::ControlResponse(value),
            "control_cancel_request" => Inbound::ControlCancel(value),
            _ => Inbound::Event(AgentEvent(value)),
        };
        Some(inbound)
    }
}

/// An agent event, passed through verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentEvent(pub Value);

impl AgentEvent {
    /// The event's `type` field ("system", "assistant", "result", ...).
    pub fn kind(&self) -> &str {
        self.0.get("type").and_then(Value::as_str).unwrap_or("")
    }

    /// `result` ends the run.
    pub fn is_terminal(&self) -> bool {
        self.kind() == "result"
    }

    pub fn session_id(&self) -> Option<&str> {
        self.0.get("session_id").and_then(Value::as_str)
    }

    /// Compact single-line JSON.
    pub fn to_line(&self) -> String {
        self.0.to_string()
    }
}
