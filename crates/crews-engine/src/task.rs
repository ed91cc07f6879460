//! Task & TaskOutput (spec §3, §4.3), grounded in the structure of
//! `other_examples/.../task.rs` (`Task`/`TaskOutput`, agent-assignment
//! fallback, prompt composition) reworked for the async/tokio idiom and
//! simplified to what SPEC_FULL.md actually names: this crate drops the
//! guardrail/retry/markdown/output-file machinery the reference file
//! carries, since the distilled spec's Task contract has none of that.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The immutable output of one task execution. Created exactly once;
/// treated as append-only thereafter (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutput {
    pub task_id: Uuid,
    pub description: String,
    pub raw: String,
    /// The role of the agent that executed this task. In Hierarchical mode
    /// this is always the manager's role (spec §4.4, §8 invariant).
    pub agent: String,
    pub json: Option<serde_json::Value>,
    pub structured: Option<serde_json::Value>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// Token usage accumulated across every LLM call this execution made
    /// (a single call in structured-JSON mode, one per ReAct iteration
    /// otherwise). Summed into `CrewOutput.usage` by the scheduler.
    #[serde(default)]
    pub usage: crews_core::Usage,
}

/// A unit of work. `description`/`expected_output` are fixed at
/// construction; `agent` (pre-assignment) and `output`/`duration`
/// (execution record) are the only mutable fields, written exactly once by
/// the scheduler (spec §3: "mutated only by the scheduler, to record the
/// assignment and output").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub description: String,
    pub expected_output: String,
    /// Pre-assigned agent role, if the caller pinned one at construction.
    pub agent: Option<String>,
    pub output: Option<TaskOutput>,
    pub duration_ms: Option<u64>,
}

impl Task {
    pub fn new(description: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Task {
            id: Uuid::now_v7(),
            description: description.into(),
            expected_output: expected_output.into(),
            agent: None,
            output: None,
            duration_ms: None,
        }
    }

    pub fn with_agent(mut self, role: impl Into<String>) -> Self {
        self.agent = Some(role.into());
        self
    }

    pub fn is_executed(&self) -> bool {
        self.output.is_some()
    }

    /// Composes the base prompt from description + expected output, as the
    /// reference task builder does (`prompt()` in the grounding file),
    /// before the caller layers on role/goal/backstory and scheduler
    /// context.
    pub fn prompt(&self) -> String {
        format!(
            "{}\n\nExpected Output: {}",
            self.description, self.expected_output
        )
    }

    /// Records the execution record exactly once. Panics if called twice --
    /// the scheduler never re-executes a task, so a second call indicates a
    /// caller bug rather than a condition to recover from.
    pub fn record_output(&mut self, output: TaskOutput, duration_ms: u64) {
        assert!(
            self.output.is_none(),
            "task {} already has a recorded output",
            self.id
        );
        self.output = Some(output);
        self.duration_ms = Some(duration_ms);
    }
}
