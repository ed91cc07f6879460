//! Conversation messages: the unit the LLM transport and the agent/task model
//! pass back and forth. Grounded in the teacher's `LlmMessage`/`LlmMessageRole`
//! split (crews-core's ancestor `llm.rs`), collapsed into a single type since
//! this crate no longer carries a separate DB-facing `ConversationMessage`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::tool::ToolCall;

/// The closed set of conversation roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// Content payload of a message: either plain text or a tool result string.
/// Structured (multi-part) content is represented as `Parts` for providers
/// that accept mixed text/image/audio segments in one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Content {
    pub fn as_text(&self) -> String {
        match self {
            Content::Text(s) => s.clone(),
            Content::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { url: String },
    Audio { url: String },
}

/// A single, immutable conversation turn.
///
/// Construction validates the role/content preconditions from the LLM
/// transport's "applied before any network I/O" rule (content must not be
/// nil, role must be one of the closed set -- the latter is structurally
/// guaranteed by `Role` being an enum).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
    /// Optional speaker name (e.g. a tool name for `Role::Tool` replies, or a
    /// participant name for multi-agent transcripts).
    pub name: Option<String>,
    /// Tool calls the assistant requested in this turn, if any.
    pub tool_calls: Vec<ToolCall>,
    /// For `Role::Tool` messages, the id of the call this message answers.
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Result<Self, CoreError> {
        let text = content.into();
        Message::validate_text(&text)?;
        Ok(Message {
            role,
            content: Content::Text(text),
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
        })
    }

    pub fn system(content: impl Into<String>) -> Result<Self, CoreError> {
        Message::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Result<Self, CoreError> {
        Message::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Result<Self, CoreError> {
        Message::new(Role::Assistant, content)
    }

    pub fn assistant_with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Message {
            role: Role::Assistant,
            content: Content::Text(String::new()),
            name: None,
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message {
            role: Role::Tool,
            content: Content::Text(content.into()),
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn validate_text(text: &str) -> Result<(), CoreError> {
        // "content not nil" -- an empty string is a valid (if unusual) turn,
        // but we reject it for non-tool roles since it almost always signals
        // a caller bug rather than an intentional empty utterance.
        if text.is_empty() {
            return Err(CoreError::Validation(
                "message content must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn text(&self) -> String {
        self.content.as_text()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_content() {
        assert!(Message::user("").is_err());
    }

    #[test]
    fn accepts_nonempty_content() {
        let m = Message::user("hello").unwrap();
        assert_eq!(m.text(), "hello");
        assert_eq!(m.role, Role::User);
    }

    #[test]
    fn tool_result_carries_call_id() {
        let m = Message::tool_result("call-1", "42");
        assert_eq!(m.role, Role::Tool);
        assert_eq!(m.tool_call_id.as_deref(), Some("call-1"));
    }
}
