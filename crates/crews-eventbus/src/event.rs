//! The closed event-type vocabulary (spec §6), modeled as a tagged-variant
//! enum per Design Note §9 ("re-architect untyped payloads as a
//! tagged-variant hierarchy where each event type is a distinct variant")
//! -- directly grounded in the teacher's `events.rs` `LoopEvent` enum, which
//! applies exactly this pattern to a smaller, single-agent vocabulary.
//!
//! Every variant carries `producer` (the crew/agent/evaluator id that
//! emitted it) and `timestamp`, echoing spec §3's "Event -- type string,
//! timestamp, producer reference, and a type-specific payload".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub cost_usd: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    LlmCallStarted {
        producer: String,
        timestamp: DateTime<Utc>,
        model: String,
    },
    LlmCallCompleted {
        producer: String,
        timestamp: DateTime<Utc>,
        model: String,
        usage: Usage,
        duration_ms: u64,
    },
    LlmCallFailed {
        producer: String,
        timestamp: DateTime<Utc>,
        model: String,
        error: String,
        attempt: u32,
    },
    LlmStreamStarted {
        producer: String,
        timestamp: DateTime<Utc>,
        model: String,
    },
    LlmStreamChunk {
        producer: String,
        timestamp: DateTime<Utc>,
        delta: String,
        chunk_index: usize,
    },
    LlmStreamEnded {
        producer: String,
        timestamp: DateTime<Utc>,
        usage: Option<Usage>,
        chunk_count: usize,
    },

    TaskExecutionStarted {
        producer: String,
        timestamp: DateTime<Utc>,
        task_id: String,
        agent_role: String,
    },
    TaskExecutionCompleted {
        producer: String,
        timestamp: DateTime<Utc>,
        task_id: String,
        agent_role: String,
        duration_ms: u64,
    },
    TaskExecutionFailed {
        producer: String,
        timestamp: DateTime<Utc>,
        task_id: String,
        agent_role: String,
        error: String,
    },

    SequentialProcessStarted {
        producer: String,
        timestamp: DateTime<Utc>,
        task_count: usize,
    },
    SequentialProcessCompleted {
        producer: String,
        timestamp: DateTime<Utc>,
        task_count: usize,
    },
    SequentialProcessCanceled {
        producer: String,
        timestamp: DateTime<Utc>,
        completed_tasks: usize,
    },
    SequentialProcessFailed {
        producer: String,
        timestamp: DateTime<Utc>,
        failed_task_id: String,
        error: String,
    },

    HierarchicalProcessStarted {
        producer: String,
        timestamp: DateTime<Utc>,
        task_count: usize,
        manager_role: String,
    },
    HierarchicalProcessCompleted {
        producer: String,
        timestamp: DateTime<Utc>,
        task_count: usize,
    },
    HierarchicalProcessCanceled {
        producer: String,
        timestamp: DateTime<Utc>,
        completed_tasks: usize,
    },
    HierarchicalProcessFailed {
        producer: String,
        timestamp: DateTime<Utc>,
        failed_task_id: String,
        error: String,
    },

    EvaluationStarted {
        producer: String,
        timestamp: DateTime<Utc>,
    },
    EvaluationCompleted {
        producer: String,
        timestamp: DateTime<Utc>,
    },
    EvaluationFailed {
        producer: String,
        timestamp: DateTime<Utc>,
        error: String,
    },
    EvaluationTaskStarted {
        producer: String,
        timestamp: DateTime<Utc>,
        task_id: String,
    },
    EvaluationTaskCompleted {
        producer: String,
        timestamp: DateTime<Utc>,
        task_id: String,
        score: f64,
    },
    EvaluationCrewTestResult {
        producer: String,
        timestamp: DateTime<Utc>,
        task_id: String,
        iteration: usize,
        score: f64,
        grade: String,
        duration_ms: u64,
    },
    EvaluationSessionStarted {
        producer: String,
        timestamp: DateTime<Utc>,
        iteration: usize,
    },
    EvaluationSessionCompleted {
        producer: String,
        timestamp: DateTime<Utc>,
        iteration: usize,
        average_score: f64,
    },

    TrainingStarted {
        producer: String,
        timestamp: DateTime<Utc>,
        total_iterations: usize,
    },
    TrainingIterationStarted {
        producer: String,
        timestamp: DateTime<Utc>,
        iteration: usize,
    },
    TrainingIterationCompleted {
        producer: String,
        timestamp: DateTime<Utc>,
        iteration: usize,
        duration_ms: u64,
    },
    TrainingFeedbackCollected {
        producer: String,
        timestamp: DateTime<Utc>,
        iteration: usize,
        quality_score: f64,
    },
    TrainingStopped {
        producer: String,
        timestamp: DateTime<Utc>,
        iteration: usize,
        reason: String,
    },
    TrainingError {
        producer: String,
        timestamp: DateTime<Utc>,
        iteration: usize,
        error: String,
    },
}

impl Event {
    /// The canonical dot-notation event-type string from spec §6.
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::LlmCallStarted { .. } => "llm_call_started",
            Event::LlmCallCompleted { .. } => "llm_call_completed",
            Event::LlmCallFailed { .. } => "llm_call_failed",
            Event::LlmStreamStarted { .. } => "llm_stream_started",
            Event::LlmStreamChunk { .. } => "llm_stream_chunk",
            Event::LlmStreamEnded { .. } => "llm_stream_ended",
            Event::TaskExecutionStarted { .. } => "task_execution_started",
            Event::TaskExecutionCompleted { .. } => "task_execution_completed",
            Event::TaskExecutionFailed { .. } => "task_execution_failed",
            Event::SequentialProcessStarted { .. } => "sequential_process_started",
            Event::SequentialProcessCompleted { .. } => "sequential_process_completed",
            Event::SequentialProcessCanceled { .. } => "sequential_process_canceled",
            Event::SequentialProcessFailed { .. } => "sequential_process_failed",
            Event::HierarchicalProcessStarted { .. } => "hierarchical_process_started",
            Event::HierarchicalProcessCompleted { .. } => "hierarchical_process_completed",
            Event::HierarchicalProcessCanceled { .. } => "hierarchical_process_canceled",
            Event::HierarchicalProcessFailed { .. } => "hierarchical_process_failed",
            Event::EvaluationStarted { .. } => "evaluation.started",
            Event::EvaluationCompleted { .. } => "evaluation.completed",
            Event::EvaluationFailed { .. } => "evaluation.failed",
            Event::EvaluationTaskStarted { .. } => "evaluation.task.started",
            Event::EvaluationTaskCompleted { .. } => "evaluation.task.completed",
            Event::EvaluationCrewTestResult { .. } => "evaluation.crew.test.result",
            Event::EvaluationSessionStarted { .. } => "evaluation.session.started",
            Event::EvaluationSessionCompleted { .. } => "evaluation.session.completed",
            Event::TrainingStarted { .. } => "training_started",
            Event::TrainingIterationStarted { .. } => "training_iteration_started",
            Event::TrainingIterationCompleted { .. } => "training_iteration_completed",
            Event::TrainingFeedbackCollected { .. } => "training_feedback_collected",
            Event::TrainingStopped { .. } => "training_stopped",
            Event::TrainingError { .. } => "training_error",
        }
    }

    pub fn producer(&self) -> &str {
        match self {
            Event::LlmCallStarted { producer, .. }
            | Event::LlmCallCompleted { producer, .. }
            | Event::LlmCallFailed { producer, .. }
            | Event::LlmStreamStarted { producer, .. }
            | Event::LlmStreamChunk { producer, .. }
            | Event::LlmStreamEnded { producer, .. }
            | Event::TaskExecutionStarted { producer, .. }
            | Event::TaskExecutionCompleted { producer, .. }
            | Event::TaskExecutionFailed { producer, .. }
            | Event::SequentialProcessStarted { producer, .. }
            | Event::SequentialProcessCompleted { producer, .. }
            | Event::SequentialProcessCanceled { producer, .. }
            | Event::SequentialProcessFailed { producer, .. }
            | Event::HierarchicalProcessStarted { producer, .. }
            | Event::HierarchicalProcessCompleted { producer, .. }
            | Event::HierarchicalProcessCanceled { producer, .. }
            | Event::HierarchicalProcessFailed { producer, .. }
            | Event::EvaluationStarted { producer, .. }
            | Event::EvaluationCompleted { producer, .. }
            | Event::EvaluationFailed { producer, .. }
            | Event::EvaluationTaskStarted { producer, .. }
            | Event::EvaluationTaskCompleted { producer, .. }
            | Event::EvaluationCrewTestResult { producer, .. }
            | Event::EvaluationSessionStarted { producer, .. }
            | Event::EvaluationSessionCompleted { producer, .. }
            | Event::TrainingStarted { producer, .. }
            | Event::TrainingIterationStarted { producer, .. }
            | Event::TrainingIterationCompleted { producer, .. }
            | Event::TrainingFeedbackCollected { producer, .. }
            | Event::TrainingStopped { producer, .. }
            | Event::TrainingError { producer, .. } => producer,
        }
    }
}
