//! The training data shapes (spec §6, §4.6.1): a per-iteration record
//! (inputs, outputs, feedback, metrics) and the `{iterations: [...]}`
//! document that wraps every record collected in one training session.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Human (or automated) judgment of one iteration's output. Scores are
/// free-form 0-10 style ratings; the training loop itself does not clamp
/// them -- unlike the evaluation engine's `TaskEvaluation`, this is an
/// external judgment the loop records verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub quality_score: f64,
    pub accuracy_score: f64,
    pub usefulness: f64,
    #[serde(default)]
    pub comments: String,
}

impl Feedback {
    pub fn new(quality_score: f64, accuracy_score: f64, usefulness: f64) -> Self {
        Feedback {
            quality_score,
            accuracy_score,
            usefulness,
            comments: String::new(),
        }
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = comments.into();
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationMetrics {
    pub execution_time_ms: u64,
    pub tokens: u32,
    pub success: bool,
}

/// One iteration of the training loop: the inputs the crew was run with,
/// its output, the feedback it received, and execution metrics (spec §6's
/// `iterations[]` shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub inputs: BTreeMap<String, Value>,
    pub outputs: Value,
    pub feedback: Feedback,
    pub metrics: IterationMetrics,
}

/// The full training session document (spec §6): `{"iterations": [...]}`.
/// `save`/`load` round-trip this; `append_ndjson` is the additive,
/// crash-surviving durability mechanism from spec §4.6.1 that writes one
/// record per line as the session progresses, ahead of the final document
/// write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingDataFile {
    pub iterations: Vec<IterationRecord>,
}

impl TrainingDataFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: IterationRecord) {
        self.iterations.push(record);
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let mut file = TrainingDataFile::new();
        file.push(IterationRecord {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            inputs: BTreeMap::new(),
            outputs: Value::String("R1".to_string()),
            feedback: Feedback::new(8.0, 7.5, 9.0),
            metrics: IterationMetrics {
                execution_time_ms: 120,
                tokens: 42,
                success: true,
            },
        });

        let json = file.to_json().unwrap();
        let restored = TrainingDataFile::from_json(&json).unwrap();
        assert_eq!(restored.iterations.len(), 1);
        assert_eq!(restored.iterations[0].feedback.quality_score, 8.0);
    }
}
