//! The training loop (spec §4.6): repeatedly runs a user-supplied execute
//! function, collects feedback per iteration, persists the session, and
//! optionally stops early on a plateau.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crews_engine::{CrewOutput, EngineError};
use crews_eventbus::{Event, EventBus};

use crate::error::{Result, TrainingError};
use crate::feedback::FeedbackProvider;
use crate::record::{Feedback, IterationMetrics, IterationRecord, TrainingDataFile};

/// The crew-running closure the loop drives once per iteration. Boxed and
/// `dyn` rather than generic so `Trainer` itself stays object-safety-free
/// but still easy to store; callers typically wrap `Crew::kickoff`.
pub type ExecuteFn = Box<
    dyn Fn(
            BTreeMap<String, Value>,
            CancellationToken,
        ) -> Pin<Box<dyn Future<Output = std::result::Result<CrewOutput, EngineError>> + Send>>
        + Send
        + Sync,
>;

#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub max_iterations: usize,
    /// Number of iterations to look back when checking for a plateau.
    /// Early stopping never triggers before `patience + 1` iterations have
    /// run.
    pub patience: usize,
    /// Minimum improvement in quality score over the `patience` window
    /// required to keep going.
    pub min_improvement: f64,
    /// When set, each iteration's record is appended as one NDJSON line to
    /// this path as it completes (spec §4.6.1's durability mechanism).
    pub ndjson_path: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            max_iterations: 10,
            patience: 3,
            min_improvement: 0.1,
            ndjson_path: None,
        }
    }
}

/// The outcome of a training run: every iteration's record plus why the
/// loop stopped.
#[derive(Debug, Clone)]
pub struct TrainingSession {
    pub data: TrainingDataFile,
    pub stop_reason: String,
}

impl TrainingSession {
    /// Serializes the full `{"iterations": [...]}` document (spec §6),
    /// independent of whatever NDJSON lines were appended along the way.
    pub fn to_json(&self) -> Result<String> {
        Ok(self.data.to_json()?)
    }
}

pub struct Trainer {
    config: TrainingConfig,
    feedback_provider: Arc<dyn FeedbackProvider>,
    event_bus: Option<Arc<dyn EventBus>>,
    producer: String,
}

impl Trainer {
    pub fn new(config: TrainingConfig, feedback_provider: Arc<dyn FeedbackProvider>) -> Self {
        Trainer {
            config,
            feedback_provider,
            event_bus: None,
            producer: "trainer".to_string(),
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<dyn EventBus>, producer: impl Into<String>) -> Self {
        self.event_bus = Some(bus);
        self.producer = producer.into();
        self
    }

    async fn emit(&self, event: Event) {
        if let Some(bus) = &self.event_bus {
            bus.emit(event).await;
        }
    }

    /// Runs `execute` for up to `max_iterations`, or until the rolling
    /// improvement in quality score over `patience` iterations drops below
    /// `min_improvement`. `inputs` is passed to every iteration unchanged;
    /// callers wanting iteration-dependent inputs should close over state
    /// in `execute` itself.
    pub async fn run(
        &self,
        execute: ExecuteFn,
        inputs: BTreeMap<String, Value>,
    ) -> Result<TrainingSession> {
        if self.config.max_iterations == 0 {
            return Err(TrainingError::Validation(
                "max_iterations must be >= 1".to_string(),
            ));
        }

        self.emit(Event::TrainingStarted {
            producer: self.producer.clone(),
            timestamp: Utc::now(),
            total_iterations: self.config.max_iterations,
        })
        .await;

        let mut data = TrainingDataFile::new();
        let mut quality_history: Vec<f64> = Vec::new();
        let mut stop_reason = "max_iterations_reached".to_string();

        for iteration in 0..self.config.max_iterations {
            self.emit(Event::TrainingIterationStarted {
                producer: self.producer.clone(),
                timestamp: Utc::now(),
                iteration,
            })
            .await;

            let started = Instant::now();
            let cancel = CancellationToken::new();
            let outcome = execute(inputs.clone(), cancel).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            let output = match outcome {
                Ok(output) => output,
                Err(err) => {
                    self.emit(Event::TrainingError {
                        producer: self.producer.clone(),
                        timestamp: Utc::now(),
                        iteration,
                        error: err.to_string(),
                    })
                    .await;
                    return Err(TrainingError::Execution(err));
                }
            };

            let feedback = self.feedback_provider.collect(iteration, &output).await;

            self.emit(Event::TrainingFeedbackCollected {
                producer: self.producer.clone(),
                timestamp: Utc::now(),
                iteration,
                quality_score: feedback.quality_score,
            })
            .await;

            let record = IterationRecord {
                id: Uuid::now_v7(),
                timestamp: Utc::now(),
                inputs: inputs.clone(),
                outputs: output
                    .json
                    .clone()
                    .unwrap_or_else(|| Value::String(output.raw.clone())),
                feedback: feedback.clone(),
                metrics: IterationMetrics {
                    execution_time_ms: duration_ms,
                    tokens: output.usage.total_tokens,
                    success: output.success,
                },
            };

            if let Some(path) = &self.config.ndjson_path {
                self.append_ndjson(path, &record).await?;
            }

            data.push(record);
            quality_history.push(feedback.quality_score);

            self.emit(Event::TrainingIterationCompleted {
                producer: self.producer.clone(),
                timestamp: Utc::now(),
                iteration,
                duration_ms,
            })
            .await;

            if should_stop_early(&quality_history, self.config.patience, self.config.min_improvement)
            {
                stop_reason = "plateau_detected".to_string();
                break;
            }
        }

        self.emit(Event::TrainingStopped {
            producer: self.producer.clone(),
            timestamp: Utc::now(),
            iteration: data.iterations.len().saturating_sub(1),
            reason: stop_reason.clone(),
        })
        .await;

        Ok(TrainingSession { data, stop_reason })
    }

    async fn append_ndjson(&self, path: &PathBuf, record: &IterationRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

/// Stops when the most recent quality score shows less than
/// `min_improvement` gain over the score from `patience` iterations back.
/// Never triggers before the history holds more than `patience` entries.
fn should_stop_early(history: &[f64], patience: usize, min_improvement: f64) -> bool {
    if patience == 0 || history.len() <= patience {
        return false;
    }
    let current = *history.last().expect("non-empty, checked above");
    let baseline = history[history.len() - 1 - patience];
    current - baseline < min_improvement
}
