//! Transport-layer error taxonomy (spec §7), scoped to this crate the way
//! the teacher scopes `AgentLoopError` to the agent-loop crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider returned an error: {0}")]
    Provider(String),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("call canceled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<crews_core::CoreError> for TransportError {
    fn from(value: crews_core::CoreError) -> Self {
        match value {
            crews_core::CoreError::Validation(msg) => TransportError::Validation(msg),
            crews_core::CoreError::Config(msg) => TransportError::Config(msg),
        }
    }
}

impl TransportError {
    /// Whether this error represents a transient fault worth retrying
    /// (HTTP 5xx or a bare transport failure) as opposed to a 4xx/validation
    /// failure, which is never retried (spec §4.2).
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
