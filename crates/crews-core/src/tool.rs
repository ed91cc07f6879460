//! Tool schemas and call/result shapes, grounded in the teacher's
//! `tool_types.rs` (`ToolDefinition`/`ToolCall`/`ToolResult`) with the
//! webhook/builtin policy split dropped -- this crate has no notion of a
//! worker executing webhooks, just the function-calling schema the LLM sees.

use serde::{Deserialize, Serialize};

/// A function schema the LLM may invoke.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// JSON-Schema-shaped parameter descriptor.
    pub parameters: serde_json::Value,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Tool {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A tool-call request emitted by the LLM inside an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as emitted by the model; the caller is responsible
    /// for deserializing into whatever shape the named tool expects.
    pub arguments: serde_json::Value,
}

/// The outcome of executing a tool call, fed back as a `Role::Tool` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(tool_call_id: impl Into<String>, result: serde_json::Value) -> Self {
        ToolResult {
            tool_call_id: tool_call_id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        ToolResult {
            tool_call_id: tool_call_id.into(),
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn as_observation(&self) -> String {
        match (&self.result, &self.error) {
            (Some(r), _) => r.to_string(),
            (None, Some(e)) => format!("Error: {e}"),
            (None, None) => String::new(),
        }
    }
}

/// Directive controlling whether/how the model should call tools, mirroring
/// the `tool_choice` field of `CallOptions`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
    Named(String),
}
