//! Engine-layer error taxonomy (spec §7), scoped to the task/agent/crew
//! boundary the way the teacher scopes `AgentLoopError` to its own crate.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("task {task_id} failed in phase {phase} (iteration {iteration}): {source}")]
    Execution {
        task_id: Uuid,
        phase: String,
        iteration: usize,
        #[source]
        source: Box<EngineError>,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("cancelled")]
    Cancelled,

    #[error("llm transport error: {0}")]
    Transport(#[from] crews_llm::TransportError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<crews_core::CoreError> for EngineError {
    fn from(value: crews_core::CoreError) -> Self {
        match value {
            crews_core::CoreError::Validation(msg) => EngineError::Validation(msg),
            crews_core::CoreError::Config(msg) => EngineError::Config(msg),
        }
    }
}

impl EngineError {
    pub fn execution(
        task_id: Uuid,
        phase: impl Into<String>,
        iteration: usize,
        source: EngineError,
    ) -> Self {
        EngineError::Execution {
            task_id,
            phase: phase.into(),
            iteration,
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
