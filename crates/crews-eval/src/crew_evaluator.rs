//! `CrewEvaluator` (spec §4.5): registers as a crew's task-completion
//! callback and grades every completed task asynchronously, piggy-backing
//! on the scheduler's own callback mechanism rather than a second pass over
//! the task list. Scoring must never block `Kickoff` (spec §5: "the
//! evaluation engine runs scoring concurrently with subsequent tasks"), so
//! `on_task_completed` only clones what the background evaluation needs and
//! spawns it, mirroring the teacher's `CrewTestResultLogger` pattern of a
//! callback that hands off to a `tokio::spawn`-ed worker instead of scoring
//! inline.
//!
//! Evaluator state (per-iteration scores and durations) is guarded by a
//! `tokio::sync::RwLock`; every reader (`tasks_scores`, `execution_times`,
//! `print_evaluation_result`) returns a deep copy, per spec §4.5's
//! "readers... must return deep copies so callers cannot mutate internal
//! maps" and the read-preferring convention in SPEC_FULL.md §5.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crews_engine::{TaskCallback, TaskOutput};
use crews_eventbus::{Event, EventBus};
use crews_llm::LlmTransport;

use crate::score::performance_label_for_score;
use crate::task_evaluator::{EvaluationConfig, TaskEvaluator};

#[derive(Debug, Clone, Default)]
struct EvaluatorState {
    scores: HashMap<usize, Vec<f64>>,
    durations_ms: HashMap<usize, Vec<u64>>,
}

/// Crew-level aggregate statistics, computed on demand from the recorded
/// per-task scores across every iteration (spec §4.5).
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateStats {
    pub total_tasks: usize,
    pub passed_tasks: usize,
    pub success_rate: f64,
    pub average_score: f64,
    pub average_duration_ms: f64,
    pub performance_label: &'static str,
}

/// Grades every task a crew completes, piggy-backing on the crew's single
/// task-completion callback slot. Construct with the set of task
/// description/expected-output pairs known ahead of kickoff (the evaluator
/// only receives the bare `TaskOutput` via the callback, which does not
/// carry `expected_output`, so the crew owner supplies it up front --
/// mirrors passing an explicit grading rubric rather than inferring one).
pub struct CrewEvaluator {
    evaluator: TaskEvaluator,
    event_bus: Option<Arc<dyn EventBus>>,
    producer: String,
    expected_outputs: HashMap<Uuid, String>,
    iteration: AtomicUsize,
    state: Arc<tokio::sync::RwLock<EvaluatorState>>,
}

impl CrewEvaluator {
    pub fn new(
        llm: Arc<dyn LlmTransport>,
        config: EvaluationConfig,
        expected_outputs: HashMap<Uuid, String>,
    ) -> Self {
        CrewEvaluator {
            evaluator: TaskEvaluator::new(llm, config),
            event_bus: None,
            producer: "crew-evaluator".to_string(),
            expected_outputs,
            iteration: AtomicUsize::new(0),
            state: Arc::new(tokio::sync::RwLock::new(EvaluatorState::default())),
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<dyn EventBus>, producer: impl Into<String>) -> Self {
        self.event_bus = Some(bus);
        self.producer = producer.into();
        self
    }

    pub fn passing_score(&self) -> f64 {
        self.evaluator.passing_score()
    }

    /// Current iteration index; 0 until `advance_iteration` is called.
    pub fn iteration(&self) -> usize {
        self.iteration.load(Ordering::SeqCst)
    }

    /// Advances to the next iteration (one full crew run), returning the
    /// new index. The training loop calls this between crew runs so scores
    /// from successive runs land in distinct buckets.
    pub fn advance_iteration(&self) -> usize {
        self.iteration.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Deep copy of every recorded score, keyed by iteration.
    pub async fn tasks_scores(&self) -> HashMap<usize, Vec<f64>> {
        self.state.read().await.scores.clone()
    }

    /// Deep copy of every recorded task duration in milliseconds, keyed by
    /// iteration.
    pub async fn execution_times(&self) -> HashMap<usize, Vec<u64>> {
        self.state.read().await.durations_ms.clone()
    }

    /// Clears all recorded state and resets the iteration counter to 0
    /// (spec §8: `Reset()` leaves `GetTasksScores()` empty and
    /// `GetIteration() == 0`).
    pub async fn reset(&self) {
        *self.state.write().await = EvaluatorState::default();
        self.iteration.store(0, Ordering::SeqCst);
    }

    /// Aggregate statistics across every recorded iteration.
    pub async fn aggregate_stats(&self) -> AggregateStats {
        let state = self.state.read().await;
        let all_scores: Vec<f64> = state.scores.values().flatten().copied().collect();
        let all_durations: Vec<u64> = state.durations_ms.values().flatten().copied().collect();

        let total_tasks = all_scores.len();
        let passing = self.passing_score();
        let passed_tasks = all_scores.iter().filter(|s| **s >= passing).count();
        let success_rate = if total_tasks == 0 {
            0.0
        } else {
            passed_tasks as f64 / total_tasks as f64 * 100.0
        };
        let average_score = if total_tasks == 0 {
            0.0
        } else {
            all_scores.iter().sum::<f64>() / total_tasks as f64
        };
        let average_duration_ms = if all_durations.is_empty() {
            0.0
        } else {
            all_durations.iter().sum::<u64>() as f64 / all_durations.len() as f64
        };

        AggregateStats {
            total_tasks,
            passed_tasks,
            success_rate,
            average_score,
            average_duration_ms,
            performance_label: performance_label_for_score(average_score),
        }
    }

    /// Human-readable aggregate report, built from the same deep-copied
    /// state the other readers use.
    pub async fn print_evaluation_result(&self) -> String {
        let stats = self.aggregate_stats().await;
        format!(
            "Evaluation Result: {}/{} tasks passed ({:.1}% success rate), \
             average score {:.2} ({}), average duration {:.0}ms",
            stats.passed_tasks,
            stats.total_tasks,
            stats.success_rate,
            stats.average_score,
            stats.performance_label,
            stats.average_duration_ms
        )
    }

    async fn emit(&self, event: Event) {
        if let Some(bus) = &self.event_bus {
            bus.emit(event).await;
        }
    }

    /// Evaluates one task output inline; used by the spawned background
    /// task and directly by tests that want a synchronous grade.
    async fn grade(&self, output: TaskOutput, iteration: usize) {
        let started = Instant::now();
        let expected_output = self
            .expected_outputs
            .get(&output.task_id)
            .cloned()
            .unwrap_or_default();

        self.emit(Event::EvaluationTaskStarted {
            producer: self.producer.clone(),
            timestamp: Utc::now(),
            task_id: output.task_id.to_string(),
        })
        .await;

        match self
            .evaluator
            .evaluate(&output.description, &expected_output, &output.raw)
            .await
        {
            Ok(evaluation) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                {
                    let mut state = self.state.write().await;
                    state
                        .scores
                        .entry(iteration)
                        .or_default()
                        .push(evaluation.score);
                    state
                        .durations_ms
                        .entry(iteration)
                        .or_default()
                        .push(duration_ms);
                }

                self.emit(Event::EvaluationTaskCompleted {
                    producer: self.producer.clone(),
                    timestamp: Utc::now(),
                    task_id: output.task_id.to_string(),
                    score: evaluation.score,
                })
                .await;

                self.emit(Event::EvaluationCrewTestResult {
                    producer: self.producer.clone(),
                    timestamp: Utc::now(),
                    task_id: output.task_id.to_string(),
                    iteration,
                    score: evaluation.score,
                    grade: evaluation.grade.clone(),
                    duration_ms,
                })
                .await;
            }
            Err(err) => {
                tracing::warn!(
                    task_id = %output.task_id,
                    error = %err,
                    "task evaluation failed; suppressed, never fatal to the crew run"
                );
                self.emit(Event::EvaluationFailed {
                    producer: self.producer.clone(),
                    timestamp: Utc::now(),
                    error: err.to_string(),
                })
                .await;
            }
        }
    }
}

/// Spawns each task's grading on a background task so `Kickoff` never waits
/// on the evaluator LLM. Clones only `Arc`-backed fields plus the cheap
/// `EvaluationConfig`, so the spawned future owns everything it touches.
#[async_trait]
impl TaskCallback for CrewEvaluator {
    async fn on_task_completed(&self, output: &TaskOutput) -> Result<(), String> {
        let evaluator = self.evaluator.clone();
        let event_bus = self.event_bus.clone();
        let producer = self.producer.clone();
        let expected_output = self
            .expected_outputs
            .get(&output.task_id)
            .cloned()
            .unwrap_or_default();
        let iteration = self.iteration();
        let state = self.state.clone();
        let output = output.clone();

        tokio::spawn(async move {
            let standalone = CrewEvaluator {
                evaluator,
                event_bus,
                producer,
                expected_outputs: {
                    let mut map = HashMap::new();
                    map.insert(output.task_id, expected_output);
                    map
                },
                iteration: AtomicUsize::new(iteration),
                state,
            };
            standalone.grade(output, iteration).await;
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crews_llm::MockLlmTransport;
    use serde_json::json;

    fn make_output(task_id: Uuid, raw: &str) -> TaskOutput {
        TaskOutput {
            task_id,
            description: "Write a haiku".to_string(),
            raw: raw.to_string(),
            agent: "Poet".to_string(),
            json: None,
            structured: None,
            metadata: json!({}),
            created_at: Utc::now(),
            usage: Default::default(),
        }
    }

    #[tokio::test]
    async fn grades_a_task_and_records_its_score() {
        let llm = Arc::new(MockLlmTransport::new("eval-model"));
        llm.push_text(r#"{"quality_score": 8.5}"#);

        let task_id = Uuid::now_v7();
        let mut expected = HashMap::new();
        expected.insert(task_id, "a haiku about rust".to_string());

        let evaluator = CrewEvaluator::new(llm, EvaluationConfig::default(), expected);
        evaluator
            .grade(make_output(task_id, "old pond / frog jumps in / sound of water"), 0)
            .await;

        let scores = evaluator.tasks_scores().await;
        assert_eq!(scores.get(&0), Some(&vec![8.5]));

        let stats = evaluator.aggregate_stats().await;
        assert_eq!(stats.total_tasks, 1);
        assert_eq!(stats.passed_tasks, 1);
        assert_eq!(stats.success_rate, 100.0);
        assert_eq!(stats.performance_label, "Very Good");
    }

    #[tokio::test]
    async fn reset_clears_scores_and_iteration() {
        let llm = Arc::new(MockLlmTransport::new("eval-model"));
        llm.push_text(r#"{"score": 7.0}"#);
        let task_id = Uuid::now_v7();
        let evaluator = CrewEvaluator::new(llm, EvaluationConfig::default(), HashMap::new());
        evaluator.advance_iteration();
        evaluator.grade(make_output(task_id, "answer"), 1).await;

        assert!(!evaluator.tasks_scores().await.is_empty());
        assert_eq!(evaluator.iteration(), 1);

        evaluator.reset().await;
        assert!(evaluator.tasks_scores().await.is_empty());
        assert_eq!(evaluator.iteration(), 0);
    }

    #[tokio::test]
    async fn on_task_completed_spawns_without_blocking() {
        let llm = Arc::new(MockLlmTransport::new("eval-model"));
        llm.push_text(r#"{"score": 9.0}"#);
        let task_id = Uuid::now_v7();
        let mut expected = HashMap::new();
        expected.insert(task_id, "answer".to_string());
        let evaluator = CrewEvaluator::new(llm, EvaluationConfig::default(), expected);

        let output = make_output(task_id, "the answer is 42");
        evaluator
            .on_task_completed(&output)
            .await
            .expect("callback never returns an error itself");

        // Give the spawned evaluation a chance to run; in a real crew run
        // this races with subsequent task execution, which is fine per
        // spec's "evaluation may complete in any order" ordering guarantee.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let scores = evaluator.tasks_scores().await;
        assert_eq!(scores.get(&0), Some(&vec![9.0]));
    }
}
