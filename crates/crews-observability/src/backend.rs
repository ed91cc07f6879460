//! Observability backend trait and event vocabulary.
//!
//! These events are the semantic layer between the crew event bus and a
//! tracing/metrics sink: one `ObservabilityEvent` per crew-bus event worth
//! recording, independent of the bus's own wire shape.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ObservabilityEvent {
    TraceStarted {
        trace_id: String,
        session_id: String,
        agent_id: Option<String>,
        metadata: HashMap<String, serde_json::Value>,
        timestamp: DateTime<Utc>,
    },
    TraceCompleted {
        trace_id: String,
        session_id: String,
        success: bool,
        error: Option<String>,
        metadata: HashMap<String, serde_json::Value>,
        timestamp: DateTime<Utc>,
    },
    GenerationStarted {
        trace_id: String,
        span_id: String,
        model: String,
        timestamp: DateTime<Utc>,
    },
    GenerationCompleted {
        trace_id: String,
        span_id: String,
        model: String,
        input_tokens: u32,
        output_tokens: u32,
        cost_usd: Option<f64>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    GenerationFailed {
        trace_id: String,
        span_id: String,
        model: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl ObservabilityEvent {
    pub fn trace_id(&self) -> &str {
        match self {
            Self::TraceStarted { trace_id, .. }
            | Self::TraceCompleted { trace_id, .. }
            | Self::GenerationStarted { trace_id, .. }
            | Self::GenerationCompleted { trace_id, .. }
            | Self::GenerationFailed { trace_id, .. } => trace_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::TraceStarted { timestamp, .. }
            | Self::TraceCompleted { timestamp, .. }
            | Self::GenerationStarted { timestamp, .. }
            | Self::GenerationCompleted { timestamp, .. }
            | Self::GenerationFailed { timestamp, .. } => *timestamp,
        }
    }
}

#[async_trait]
pub trait ObservabilityBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_enabled(&self) -> bool;

    async fn record(&self, event: ObservabilityEvent) -> Result<(), ObservabilityError>;

    async fn flush(&self) -> Result<(), ObservabilityError>;

    async fn shutdown(&self) -> Result<(), ObservabilityError> {
        self.flush().await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("export error: {0}")]
    Export(String),
    #[error("backend not enabled")]
    NotEnabled,
}

pub struct NoopBackend;

#[async_trait]
impl ObservabilityBackend for NoopBackend {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn record(&self, _event: ObservabilityEvent) -> Result<(), ObservabilityError> {
        Ok(())
    }

    async fn flush(&self) -> Result<(), ObservabilityError> {
        Ok(())
    }
}

/// Records every event as a structured `tracing` span/event. This is the
/// default backend: it needs no network client or credentials, so it is
/// always enabled.
pub struct TracingBackend;

#[async_trait]
impl ObservabilityBackend for TracingBackend {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn record(&self, event: ObservabilityEvent) -> Result<(), ObservabilityError> {
        match event {
            ObservabilityEvent::TraceStarted {
                trace_id,
                session_id,
                ..
            } => {
                tracing::info!(trace_id, session_id, "trace started");
            }
            ObservabilityEvent::TraceCompleted {
                trace_id,
                success,
                error,
                ..
            } => {
                tracing::info!(trace_id, success, error = error.as_deref(), "trace completed");
            }
            ObservabilityEvent::GenerationStarted {
                trace_id,
                span_id,
                model,
                ..
            } => {
                tracing::info!(trace_id, span_id, model, "generation started");
            }
            ObservabilityEvent::GenerationCompleted {
                trace_id,
                span_id,
                model,
                input_tokens,
                output_tokens,
                cost_usd,
                duration_ms,
                ..
            } => {
                tracing::info!(
                    trace_id,
                    span_id,
                    model,
                    input_tokens,
                    output_tokens,
                    cost_usd,
                    duration_ms,
                    "generation completed"
                );
            }
            ObservabilityEvent::GenerationFailed {
                trace_id,
                span_id,
                model,
                error,
                ..
            } => {
                tracing::warn!(trace_id, span_id, model, error, "generation failed");
            }
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), ObservabilityError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_started_exposes_trace_id() {
        let event = ObservabilityEvent::TraceStarted {
            trace_id: "t1".to_string(),
            session_id: "s1".to_string(),
            agent_id: None,
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        };
        assert_eq!(event.trace_id(), "t1");
    }

    #[tokio::test]
    async fn tracing_backend_is_always_enabled() {
        let backend = TracingBackend;
        assert!(backend.is_enabled());
        let event = ObservabilityEvent::TraceStarted {
            trace_id: "t".to_string(),
            session_id: "s".to_string(),
            agent_id: None,
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        };
        backend.record(event).await.unwrap();
    }

    #[tokio::test]
    async fn noop_backend_is_disabled() {
        let backend = NoopBackend;
        assert!(!backend.is_enabled());
    }
}
