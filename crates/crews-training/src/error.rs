//! Training-loop error taxonomy (spec §7), scoped to this crate the way
//! the teacher scopes `AgentLoopError` to its own crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("crew execution failed during training: {0}")]
    Execution(#[from] crews_engine::EngineError),

    #[error("failed to persist training data: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize training data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TrainingError>;
