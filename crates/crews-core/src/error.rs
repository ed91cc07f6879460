//! Base error kinds shared across crate boundaries.
//!
//! Per-crate concerns (transport, engine, evaluation) define their own
//! `thiserror` enum scoped to that crate -- matching the teacher's
//! one-error-type-per-concern convention (`AgentLoopError`) -- but the
//! validation/config kinds are common enough to share a single definition
//! here so every crate's error enum can wrap `CoreError` with `#[from]`
//! instead of re-declaring "ValidationError" five times.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("config error: {0}")]
    Config(String),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        CoreError::Config(msg.into())
    }
}
