//! Error taxonomy for the evaluation engine, scoped like the other
//! per-crate boundaries (`EngineError`, `TransportError`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("evaluation llm transport error: {0}")]
    Transport(#[from] crews_llm::TransportError),

    #[error("could not parse a score from the evaluator response")]
    Unparseable,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EvalError>;
