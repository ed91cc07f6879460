//! Core data model for the crew execution engine.
//!
//! This crate defines the vocabulary everything else in the workspace
//! speaks: conversation messages, call options, tool schemas, unary and
//! streaming responses, the task-context map, and the handful of error
//! kinds (`ValidationError`, `ConfigError`) common enough to be shared
//! rather than re-declared in every downstream crate's own error enum.

pub mod context;
pub mod error;
pub mod message;
pub mod options;
pub mod response;
pub mod tool;

pub use context::Context;
pub use error::CoreError;
pub use message::{Content, ContentPart, Message, Role};
pub use options::{CallOptions, ResponseFormat, ResponseFormatKind};
pub use response::{FinishReason, Response, StreamResponse, Usage};
pub use tool::{Tool, ToolCall, ToolChoice, ToolResult};
