//! Scenario tests exercising the sequential and hierarchical process
//! disciplines end to end against `MockLlmTransport` and `InMemoryEventBus`.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crews_engine::{Crew, CrewConfig, Process};
use crews_engine::{Agent, Task};
use crews_eventbus::InMemoryEventBus;
use crews_llm::MockLlmTransport;

/// S1: two sequential tasks, both succeed; events fire in order and the
/// second task's context carries the first task's output.
#[tokio::test]
async fn sequential_two_task_happy_path() {
    let llm = Arc::new(MockLlmTransport::new("mock-model"));
    llm.push_text("first result");
    llm.push_text("second result");

    let agent = Arc::new(Agent::new(
        "Researcher",
        "research topics thoroughly",
        "a careful analyst",
        llm.clone(),
    ));

    let tasks = vec![
        Task::new("Find three facts about Rust", "a bullet list"),
        Task::new("Summarize the prior findings", "one paragraph"),
    ];

    let bus = Arc::new(InMemoryEventBus::new());
    let config = CrewConfig::new("research-crew", Process::Sequential);
    let mut crew = Crew::new(config, vec![agent], tasks, bus.clone());

    let output = crew
        .kickoff(BTreeMap::new(), CancellationToken::new())
        .await
        .expect("sequential kickoff should succeed");

    assert!(output.success);
    assert_eq!(output.task_outputs.len(), 2);
    assert_eq!(output.task_outputs[0].raw, "first result");
    assert_eq!(output.raw, "second result");

    let types: Vec<&str> = bus
        .events()
        .await
        .iter()
        .map(|e| e.event_type())
        .collect();
    assert_eq!(types.first(), Some(&"sequential_process_started"));
    assert_eq!(types.last(), Some(&"sequential_process_completed"));
    assert!(types.contains(&"task_execution_completed"));

    let second_call_messages = &llm.calls()[1].messages;
    assert!(second_call_messages
        .iter()
        .any(|m| m.contains("first result")));

    // Spec §4.4 step 2: `previous_tasks_output` is a list of
    // {agent, description, raw, created_at, json?} objects, not a flat
    // list of raw strings.
    assert_eq!(output.task_outputs.len(), 2);
    let first_output = &output.task_outputs[0];
    let expected_entry = serde_json::json!({
        "agent": first_output.agent,
        "description": first_output.description,
        "raw": first_output.raw,
        "created_at": first_output.created_at,
        "json": first_output.json,
    });
    let rendered = second_call_messages.iter().find(|m| m.contains("previous_tasks_output"));
    assert!(
        rendered.is_some(),
        "second task's context should carry previous_tasks_output"
    );
    let rendered = rendered.unwrap();
    let entry_str = serde_json::to_string(&expected_entry).unwrap();
    // `Context::render` prints compact JSON per reserved key; the entry for
    // task 1 must appear verbatim inside the `previous_tasks_output` array.
    assert!(
        rendered.contains(&format!("\"agent\":\"{}\"", first_output.agent))
            && rendered.contains(&format!("\"raw\":\"{}\"", first_output.raw)),
        "previous_tasks_output entry missing structured fields; rendered = {rendered}, expected entry = {entry_str}"
    );
}

/// S2: hierarchical process with three tasks; the manager executes every
/// task and every output's `agent` field is the manager's role.
#[tokio::test]
async fn hierarchical_three_task_manager_executes_everything() {
    let llm = Arc::new(MockLlmTransport::new("mock-model"));
    llm.push_text("plan");
    llm.push_text("build");
    llm.push_text("ship");

    let tasks = vec![
        Task::new("Plan the release", "a checklist"),
        Task::new("Build the release", "a status report"),
        Task::new("Ship the release", "a confirmation"),
    ];

    let bus = Arc::new(InMemoryEventBus::new());
    let config = CrewConfig::new("release-crew", Process::Hierarchical).with_manager_llm(llm);
    let mut crew = Crew::new(config, vec![], tasks, bus);

    let output = crew
        .kickoff(BTreeMap::new(), CancellationToken::new())
        .await
        .expect("hierarchical kickoff should succeed");

    assert!(output.success);
    assert_eq!(output.task_outputs.len(), 3);
    let manager_role = output.task_outputs[0].agent.clone();
    assert!(output
        .task_outputs
        .iter()
        .all(|o| o.agent == manager_role));
}

/// S3: a sequential crew whose second task's LLM call fails persistently
/// aborts the remaining tasks and surfaces the failure.
#[tokio::test]
async fn sequential_failure_mid_pipeline_aborts_remaining_tasks() {
    let llm = Arc::new(MockLlmTransport::new("mock-model"));
    llm.push_text("first result");
    // No second response queued: the mock errors "no queued responses".

    let agent = Arc::new(Agent::new("Writer", "write copy", "a copywriter", llm));

    let tasks = vec![
        Task::new("Draft the intro", "a paragraph"),
        Task::new("Draft the conclusion", "a paragraph"),
        Task::new("Never reached", "unused"),
    ];

    let bus = Arc::new(InMemoryEventBus::new());
    let config = CrewConfig::new("writing-crew", Process::Sequential);
    let mut crew = Crew::new(config, vec![agent], tasks, bus.clone());

    let result = crew.kickoff(BTreeMap::new(), CancellationToken::new()).await;
    assert!(result.is_err());

    let types: Vec<&str> = bus
        .events()
        .await
        .iter()
        .map(|e| e.event_type())
        .collect();
    assert!(types.contains(&"sequential_process_failed"));
    assert!(!types.contains(&"sequential_process_completed"));
    assert_eq!(
        types.iter().filter(|t| **t == "task_execution_failed").count(),
        1
    );
}

/// Spec §8 boundary: a zero-agent Sequential Kickoff fails without emitting
/// `task_execution_started`, since agent selection happens before the
/// started event.
#[tokio::test]
async fn zero_agent_sequential_kickoff_fails_without_starting_a_task() {
    let tasks = vec![Task::new("Do something", "a result")];
    let bus = Arc::new(InMemoryEventBus::new());
    let config = CrewConfig::new("empty-crew", Process::Sequential);
    let mut crew = Crew::new(config, vec![], tasks, bus.clone());

    let result = crew.kickoff(BTreeMap::new(), CancellationToken::new()).await;
    assert!(result.is_err());

    let types: Vec<&str> = bus.events().await.iter().map(|e| e.event_type()).collect();
    assert!(!types.contains(&"task_execution_started"));
}

/// Spec §8 boundary: canceling after the k-th task produces a CrewOutput
/// with k TaskOutputs and success = false, rather than an error.
#[tokio::test]
async fn cancellation_after_first_task_yields_partial_output() {
    let llm = Arc::new(MockLlmTransport::new("mock-model"));
    llm.push_text("first result");
    llm.push_text("second result");

    let agent = Arc::new(Agent::new("Writer", "write copy", "a copywriter", llm));
    let tasks = vec![
        Task::new("Draft the intro", "a paragraph"),
        Task::new("Draft the conclusion", "a paragraph"),
    ];

    let bus = Arc::new(InMemoryEventBus::new());
    let config = CrewConfig::new("writing-crew", Process::Sequential);
    let mut crew = Crew::new(config, vec![agent], tasks, bus.clone());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let output = crew
        .kickoff(BTreeMap::new(), cancel)
        .await
        .expect("cancellation is a non-fatal, partial result");

    assert!(!output.success);
    assert_eq!(output.task_outputs.len(), 0);

    let types: Vec<&str> = bus.events().await.iter().map(|e| e.event_type()).collect();
    assert!(types.contains(&"sequential_process_canceled"));
}
