//! End-to-end training loop scenarios against a mocked crew: the trainer
//! drives a one-task crew through several iterations, collecting feedback
//! and persisting the session.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crews_engine::{Agent, Crew, CrewConfig, Process, Task};
use crews_eventbus::InMemoryEventBus;
use crews_llm::MockLlmTransport;
use crews_training::{
    ExecuteFn, Feedback, StaticFeedbackProvider, Trainer, TrainingConfig,
};

fn build_crew(llm: Arc<MockLlmTransport>, bus: Arc<InMemoryEventBus>) -> Crew {
    let agent = Arc::new(Agent::new(
        "Writer",
        "draft short answers",
        "a concise assistant",
        llm,
    ));
    let tasks = vec![Task::new("Write one sentence about Rust", "one sentence")];
    let config = CrewConfig::new("training-crew", Process::Sequential);
    Crew::new(config, vec![agent], tasks, bus)
}

/// Runs to `max_iterations` when feedback never improves enough to
/// plateau within the patience window.
#[tokio::test]
async fn trains_for_max_iterations_and_persists_ndjson() {
    let dir = tempfile::tempdir().unwrap();
    let ndjson_path = dir.path().join("session.ndjson");

    let llm = Arc::new(MockLlmTransport::new("mock-model"));
    for _ in 0..4 {
        llm.push_text("Rust is fast and safe.");
    }
    let bus = Arc::new(InMemoryEventBus::new());
    let crew = Arc::new(Mutex::new(build_crew(llm, bus.clone())));

    let execute: ExecuteFn = {
        let crew = crew.clone();
        Box::new(move |inputs, cancel| {
            let crew = crew.clone();
            Box::pin(async move {
                let mut crew = crew.lock().await;
                crew.kickoff(inputs, cancel).await
            })
        })
    };

    let config = TrainingConfig {
        max_iterations: 4,
        patience: 10,
        min_improvement: 0.1,
        ndjson_path: Some(ndjson_path.clone()),
    };
    let feedback = Arc::new(StaticFeedbackProvider::new(vec![Feedback::new(
        7.0, 7.0, 7.0,
    )]));
    let trainer = Trainer::new(config, feedback).with_event_bus(bus, "training-crew");

    let session = trainer.run(execute, BTreeMap::new()).await.unwrap();

    assert_eq!(session.data.iterations.len(), 4);
    assert_eq!(session.stop_reason, "max_iterations_reached");
    for record in &session.data.iterations {
        assert!(record.metrics.success);
        assert!(record.metrics.tokens > 0);
    }

    let contents = tokio::fs::read_to_string(&ndjson_path).await.unwrap();
    assert_eq!(contents.lines().count(), 4);
}

/// Stops early once the rolling improvement over the patience window
/// drops below the configured threshold.
#[tokio::test]
async fn stops_early_on_quality_plateau() {
    let llm = Arc::new(MockLlmTransport::new("mock-model"));
    for _ in 0..10 {
        llm.push_text("Rust is fast and safe.");
    }
    let bus = Arc::new(InMemoryEventBus::new());
    let crew = Arc::new(Mutex::new(build_crew(llm, bus)));

    let execute: ExecuteFn = {
        let crew = crew.clone();
        Box::new(move |inputs, cancel| {
            let crew = crew.clone();
            Box::pin(async move {
                let mut crew = crew.lock().await;
                crew.kickoff(inputs, cancel).await
            })
        })
    };

    // Scores plateau after the third iteration: 5, 5, 5, 5.05 -- the fourth
    // iteration's gain over the one three iterations back is below 0.1.
    let feedback = Arc::new(StaticFeedbackProvider::new(vec![
        Feedback::new(5.0, 5.0, 5.0),
        Feedback::new(5.0, 5.0, 5.0),
        Feedback::new(5.0, 5.0, 5.0),
        Feedback::new(5.05, 5.0, 5.0),
    ]));
    let config = TrainingConfig {
        max_iterations: 10,
        patience: 3,
        min_improvement: 0.1,
        ndjson_path: None,
    };
    let trainer = Trainer::new(config, feedback);

    let session = trainer.run(execute, BTreeMap::new()).await.unwrap();

    assert_eq!(session.stop_reason, "plateau_detected");
    assert_eq!(session.data.iterations.len(), 4);
}
