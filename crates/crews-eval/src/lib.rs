//! Evaluation Engine (C5): per-task scoring via a secondary LLM call and
//! crew-wide aggregate statistics (spec §4.5).
//!
//! `TaskEvaluator` grades one task output in isolation; `CrewEvaluator`
//! wraps it as a crew's task-completion callback so every task a crew
//! executes gets graded asynchronously, without the scheduler waiting on
//! the evaluator LLM (spec §5).

pub mod crew_evaluator;
pub mod error;
pub mod score;
pub mod task_evaluator;

pub use crew_evaluator::{AggregateStats, CrewEvaluator};
pub use error::{EvalError, Result};
pub use score::{grade_for_score, parse_evaluation, performance_label_for_score, MetricCategory, TaskEvaluation};
pub use task_evaluator::{EvaluationConfig, TaskEvaluator};
