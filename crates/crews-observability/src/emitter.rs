//! Bridges the crew event bus to a set of `ObservabilityBackend`s.
//!
//! `ObservabilityHandler` is a plain `EventHandler`: subscribe it to any
//! `EventBus` (with `EventTypeFilter::All`, typically) and every event
//! emitted crew-wide is converted to the appropriate `ObservabilityEvent`
//! and recorded on each enabled backend. Conversion is stateless -- each
//! crew-bus event carries enough of its own identity (producer, task id)
//! that no cross-event trace bookkeeping is needed.

use std::sync::Arc;

use async_trait::async_trait;
use crews_eventbus::{Event, EventHandler};

use crate::backend::ObservabilityBackend;

pub struct ObservabilityHandler {
    backends: Vec<Arc<dyn ObservabilityBackend>>,
}

impl ObservabilityHandler {
    pub fn new(backends: Vec<Arc<dyn ObservabilityBackend>>) -> Self {
        ObservabilityHandler { backends }
    }

    fn convert(&self, event: &Event) -> Vec<crate::backend::ObservabilityEvent> {
        use crate::backend::ObservabilityEvent as Obs;

        match event {
            Event::TaskExecutionStarted {
                producer,
                timestamp,
                task_id,
                agent_role,
            } => vec![Obs::TraceStarted {
                trace_id: task_id.clone(),
                session_id: producer.clone(),
                agent_id: Some(agent_role.clone()),
                metadata: Default::default(),
                timestamp: *timestamp,
            }],
            Event::TaskExecutionCompleted {
                producer,
                timestamp,
                task_id,
                ..
            } => vec![Obs::TraceCompleted {
                trace_id: task_id.clone(),
                session_id: producer.clone(),
                success: true,
                error: None,
                metadata: Default::default(),
                timestamp: *timestamp,
            }],
            Event::TaskExecutionFailed {
                producer,
                timestamp,
                task_id,
                error,
                ..
            } => vec![Obs::TraceCompleted {
                trace_id: task_id.clone(),
                session_id: producer.clone(),
                success: false,
                error: Some(error.clone()),
                metadata: Default::default(),
                timestamp: *timestamp,
            }],
            Event::LlmCallStarted {
                producer,
                timestamp,
                model,
            } => vec![Obs::GenerationStarted {
                trace_id: producer.clone(),
                span_id: format!("{producer}:{}", timestamp.timestamp_nanos_opt().unwrap_or(0)),
                model: model.clone(),
                timestamp: *timestamp,
            }],
            Event::LlmCallCompleted {
                producer,
                timestamp,
                model,
                usage,
                duration_ms,
            } => vec![Obs::GenerationCompleted {
                trace_id: producer.clone(),
                span_id: format!("{producer}:{}", timestamp.timestamp_nanos_opt().unwrap_or(0)),
                model: model.clone(),
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
                cost_usd: usage.cost_usd,
                duration_ms: *duration_ms,
                timestamp: *timestamp,
            }],
            Event::LlmCallFailed {
                producer,
                timestamp,
                model,
                error,
                ..
            } => vec![Obs::GenerationFailed {
                trace_id: producer.clone(),
                span_id: format!("{producer}:{}", timestamp.timestamp_nanos_opt().unwrap_or(0)),
                model: model.clone(),
                error: error.clone(),
                timestamp: *timestamp,
            }],
            _ => vec![],
        }
    }
}

#[async_trait]
impl EventHandler for ObservabilityHandler {
    async fn handle(&self, event: &Event) -> Result<(), String> {
        for obs_event in self.convert(event) {
            for backend in &self.backends {
                if backend.is_enabled() {
                    if let Err(err) = backend.record(obs_event.clone()).await {
                        tracing::warn!(
                            backend = backend.name(),
                            error = %err,
                            "failed to record observability event"
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NoopBackend;
    use chrono::Utc;

    #[tokio::test]
    async fn task_started_converts_to_trace_started() {
        let handler = ObservabilityHandler::new(vec![Arc::new(NoopBackend)]);
        let event = Event::TaskExecutionStarted {
            producer: "crew-1".to_string(),
            timestamp: Utc::now(),
            task_id: "task-1".to_string(),
            agent_role: "Researcher".to_string(),
        };
        assert!(handler.handle(&event).await.is_ok());
    }

    #[tokio::test]
    async fn unmapped_event_produces_no_observability_events() {
        let handler = ObservabilityHandler::new(vec![]);
        let event = Event::TrainingStarted {
            producer: "trainer".to_string(),
            timestamp: Utc::now(),
            total_iterations: 3,
        };
        assert!(handler.convert(&event).is_empty());
        assert!(handler.handle(&event).await.is_ok());
    }
}
