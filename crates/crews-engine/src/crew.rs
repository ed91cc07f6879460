//! The process scheduler: `Crew`, its `Sequential`/`Hierarchical`
//! disciplines, and `Kickoff` (spec §4.4).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crews_core::Context;
use crews_eventbus::{Event, EventBus};
use crews_llm::LlmTransport;

use crate::agent::Agent;
use crate::error::{EngineError, Result};
use crate::task::{Task, TaskOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Process {
    Sequential,
    Hierarchical,
}

/// Invoked once per completed task. A callback error is logged and does not
/// abort the run -- only agent/LLM execution failures are fatal.
#[async_trait]
pub trait TaskCallback: Send + Sync {
    async fn on_task_completed(&self, output: &TaskOutput) -> std::result::Result<(), String>;
}

pub struct CrewConfig {
    pub name: String,
    pub process: Process,
    pub verbose: bool,
    /// Used to build the manager agent when `manager_agent` is absent and
    /// `process == Hierarchical`.
    pub manager_llm: Option<Arc<dyn LlmTransport>>,
    pub manager_agent: Option<Arc<Agent>>,
    pub task_callback: Option<Arc<dyn TaskCallback>>,
}

impl CrewConfig {
    pub fn new(name: impl Into<String>, process: Process) -> Self {
        CrewConfig {
            name: name.into(),
            process,
            verbose: false,
            manager_llm: None,
            manager_agent: None,
            task_callback: None,
        }
    }

    pub fn with_manager_llm(mut self, llm: Arc<dyn LlmTransport>) -> Self {
        self.manager_llm = Some(llm);
        self
    }

    pub fn with_manager_agent(mut self, agent: Arc<Agent>) -> Self {
        self.manager_agent = Some(agent);
        self
    }

    pub fn with_task_callback(mut self, callback: Arc<dyn TaskCallback>) -> Self {
        self.task_callback = Some(callback);
        self
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CrewOutput {
    pub raw: String,
    pub json: Option<Value>,
    pub usage: crews_core::Usage,
    pub task_outputs: Vec<TaskOutput>,
    pub success: bool,
    pub metadata: Value,
}

pub struct Crew {
    config: CrewConfig,
    agents: Vec<Arc<Agent>>,
    tasks: Vec<Task>,
    event_bus: Arc<dyn EventBus>,
}

impl Crew {
    pub fn new(
        config: CrewConfig,
        agents: Vec<Arc<Agent>>,
        tasks: Vec<Task>,
        event_bus: Arc<dyn EventBus>,
    ) -> Self {
        Crew {
            config,
            agents,
            tasks,
            event_bus,
        }
    }

    fn manager(&self) -> Result<Arc<Agent>> {
        if let Some(agent) = &self.config.manager_agent {
            return Ok(agent.clone());
        }
        let llm = self
            .config
            .manager_llm
            .clone()
            .ok_or_else(|| EngineError::Config(
                "hierarchical process requires a manager_llm or manager_agent".to_string(),
            ))?;
        Ok(Arc::new(Agent::new(
            "Crew Manager",
            "Coordinate the crew's agents to complete every task and synthesize a final result",
            "An experienced project lead who delegates nothing and executes every task personally \
             when no delegate is configured",
            llm,
        )))
    }

    fn pick_agent(&self, task: &Task, index: usize) -> Result<Arc<Agent>> {
        if let Some(role) = &task.agent {
            return self
                .agents
                .iter()
                .find(|a| &a.role == role)
                .cloned()
                .ok_or_else(|| EngineError::NotFound(format!("no agent with role '{role}'")));
        }
        if self.agents.is_empty() {
            return Err(EngineError::Config(
                "crew has no agents to assign tasks to".to_string(),
            ));
        }
        Ok(self.agents[index % self.agents.len()].clone())
    }

    /// Builds the per-task context, seeding it from `inputs` and layering the
    /// six reserved keys on top (`previous_tasks_output`, `last_task_output`,
    /// `last_task_json`, `crew_name`, `completed_tasks`, `aggregated_context`).
    fn prepare_context(
        &self,
        inputs: &BTreeMap<String, Value>,
        completed: &[TaskOutput],
    ) -> Context {
        let mut ctx = Context::from_inputs(inputs);

        let previous: Vec<Value> = completed
            .iter()
            .map(|o| {
                serde_json::json!({
                    "agent": o.agent,
                    "description": o.description,
                    "raw": o.raw,
                    "created_at": o.created_at,
                    "json": o.json,
                })
            })
            .collect();
        ctx.insert_reserved("previous_tasks_output", &previous);
        ctx.insert_reserved("crew_name", &self.config.name);
        ctx.insert_reserved("completed_tasks", completed.len());

        match completed.last() {
            Some(last) => {
                ctx.insert_reserved("last_task_output", &last.raw);
                ctx.insert_reserved("last_task_json", &last.json);
            }
            None => {
                ctx.insert_reserved("last_task_output", "");
                ctx.insert_reserved("last_task_json", Option::<Value>::None);
            }
        }

        let aggregated = completed
            .iter()
            .map(|o| format!("[{}]\n{}", o.agent, o.raw))
            .collect::<Vec<_>>()
            .join("\n\n");
        ctx.insert_reserved("aggregated_context", aggregated);

        ctx
    }

    async fn invoke_callback(&self, output: &TaskOutput) {
        if let Some(callback) = &self.config.task_callback {
            if let Err(err) = callback.on_task_completed(output).await {
                tracing::warn!(task_id = %output.task_id, error = %err, "task callback failed");
            }
        }
    }

    /// Runs every task to completion per the configured process discipline,
    /// returning a `CrewOutput` built from the last task's result. Returns
    /// `Err` only on a fatal agent/LLM execution failure; cancellation
    /// produces a partial, non-fatal `Ok` result with `success = false`.
    pub async fn kickoff(
        &mut self,
        inputs: BTreeMap<String, Value>,
        cancel: CancellationToken,
    ) -> Result<CrewOutput> {
        match self.config.process {
            Process::Sequential => self.kickoff_sequential(inputs, cancel).await,
            Process::Hierarchical => self.kickoff_hierarchical(inputs, cancel).await,
        }
    }

    async fn kickoff_sequential(
        &mut self,
        inputs: BTreeMap<String, Value>,
        cancel: CancellationToken,
    ) -> Result<CrewOutput> {
        let task_count = self.tasks.len();
        self.event_bus
            .emit(Event::SequentialProcessStarted {
                producer: self.config.name.clone(),
                timestamp: Utc::now(),
                task_count,
            })
            .await;

        let mut completed: Vec<TaskOutput> = Vec::with_capacity(task_count);

        for index in 0..task_count {
            if cancel.is_cancelled() {
                self.event_bus
                    .emit(Event::SequentialProcessCanceled {
                        producer: self.config.name.clone(),
                        timestamp: Utc::now(),
                        completed_tasks: completed.len(),
                    })
                    .await;
                return Ok(self.partial_output(completed));
            }

            let agent = self.pick_agent(&self.tasks[index], index)?;
            let context = self.prepare_context(&inputs, &completed);

            match self.execute_task(&agent, index, &context, &cancel).await {
                Ok((output, duration_ms)) => {
                    self.invoke_callback(&output).await;
                    self.tasks[index].record_output(output.clone(), duration_ms);
                    completed.push(output);
                }
                Err(EngineError::Cancelled) => {
                    self.event_bus
                        .emit(Event::SequentialProcessCanceled {
                            producer: self.config.name.clone(),
                            timestamp: Utc::now(),
                            completed_tasks: completed.len(),
                        })
                        .await;
                    return Ok(self.partial_output(completed));
                }
                Err(err) => {
                    self.event_bus
                        .emit(Event::SequentialProcessFailed {
                            producer: self.config.name.clone(),
                            timestamp: Utc::now(),
                            failed_task_id: self.tasks[index].id.to_string(),
                            error: err.to_string(),
                        })
                        .await;
                    return Err(EngineError::execution(
                        self.tasks[index].id,
                        "sequential_process",
                        index,
                        err,
                    ));
                }
            }
        }

        self.event_bus
            .emit(Event::SequentialProcessCompleted {
                producer: self.config.name.clone(),
                timestamp: Utc::now(),
                task_count,
            })
            .await;

        Ok(self.final_output(completed))
    }

    async fn kickoff_hierarchical(
        &mut self,
        inputs: BTreeMap<String, Value>,
        cancel: CancellationToken,
    ) -> Result<CrewOutput> {
        let manager = self.manager()?;
        let task_count = self.tasks.len();

        self.event_bus
            .emit(Event::HierarchicalProcessStarted {
                producer: self.config.name.clone(),
                timestamp: Utc::now(),
                task_count,
                manager_role: manager.role().to_string(),
            })
            .await;

        let mut completed: Vec<TaskOutput> = Vec::with_capacity(task_count);

        for index in 0..task_count {
            if cancel.is_cancelled() {
                self.event_bus
                    .emit(Event::HierarchicalProcessCanceled {
                        producer: self.config.name.clone(),
                        timestamp: Utc::now(),
                        completed_tasks: completed.len(),
                    })
                    .await;
                return Ok(self.partial_output(completed));
            }

            let context = self.prepare_context(&inputs, &completed);

            let started = Instant::now();
            self.event_bus
                .emit(Event::TaskExecutionStarted {
                    producer: self.config.name.clone(),
                    timestamp: Utc::now(),
                    task_id: self.tasks[index].id.to_string(),
                    agent_role: manager.role().to_string(),
                })
                .await;

            match manager.execute(&self.tasks[index], &context, &cancel).await {
                Ok(output) => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    self.event_bus
                        .emit(Event::TaskExecutionCompleted {
                            producer: self.config.name.clone(),
                            timestamp: Utc::now(),
                            task_id: self.tasks[index].id.to_string(),
                            agent_role: manager.role().to_string(),
                            duration_ms,
                        })
                        .await;
                    self.invoke_callback(&output).await;
                    self.tasks[index].record_output(output.clone(), duration_ms);
                    completed.push(output);
                }
                Err(EngineError::Cancelled) => {
                    self.event_bus
                        .emit(Event::HierarchicalProcessCanceled {
                            producer: self.config.name.clone(),
                            timestamp: Utc::now(),
                            completed_tasks: completed.len(),
                        })
                        .await;
                    return Ok(self.partial_output(completed));
                }
                Err(err) => {
                    self.event_bus
                        .emit(Event::TaskExecutionFailed {
                            producer: self.config.name.clone(),
                            timestamp: Utc::now(),
                            task_id: self.tasks[index].id.to_string(),
                            agent_role: manager.role().to_string(),
                            error: err.to_string(),
                        })
                        .await;
                    self.event_bus
                        .emit(Event::HierarchicalProcessFailed {
                            producer: self.config.name.clone(),
                            timestamp: Utc::now(),
                            failed_task_id: self.tasks[index].id.to_string(),
                            error: err.to_string(),
                        })
                        .await;
                    return Err(EngineError::execution(
                        self.tasks[index].id,
                        "hierarchical_process",
                        index,
                        err,
                    ));
                }
            }
        }

        self.event_bus
            .emit(Event::HierarchicalProcessCompleted {
                producer: self.config.name.clone(),
                timestamp: Utc::now(),
                task_count,
            })
            .await;

        Ok(self.final_output(completed))
    }

    async fn execute_task(
        &self,
        agent: &Arc<Agent>,
        index: usize,
        context: &Context,
        cancel: &CancellationToken,
    ) -> Result<(TaskOutput, u64)> {
        let started = Instant::now();
        self.event_bus
            .emit(Event::TaskExecutionStarted {
                producer: self.config.name.clone(),
                timestamp: Utc::now(),
                task_id: self.tasks[index].id.to_string(),
                agent_role: agent.role().to_string(),
            })
            .await;

        let result = agent.execute(&self.tasks[index], context, cancel).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => {
                self.event_bus
                    .emit(Event::TaskExecutionCompleted {
                        producer: self.config.name.clone(),
                        timestamp: Utc::now(),
                        task_id: self.tasks[index].id.to_string(),
                        agent_role: agent.role().to_string(),
                        duration_ms,
                    })
                    .await;
            }
            Err(err) if !matches!(err, EngineError::Cancelled) => {
                self.event_bus
                    .emit(Event::TaskExecutionFailed {
                        producer: self.config.name.clone(),
                        timestamp: Utc::now(),
                        task_id: self.tasks[index].id.to_string(),
                        agent_role: agent.role().to_string(),
                        error: err.to_string(),
                    })
                    .await;
            }
            Err(_) => {}
        }

        result.map(|output| (output, duration_ms))
    }

    fn total_usage(completed: &[TaskOutput]) -> crews_core::Usage {
        completed
            .iter()
            .fold(crews_core::Usage::default(), |acc, o| acc + o.usage)
    }

    fn final_output(&self, completed: Vec<TaskOutput>) -> CrewOutput {
        let raw = completed
            .last()
            .map(|o| o.raw.clone())
            .unwrap_or_default();
        let json = completed.last().and_then(|o| o.json.clone());
        let usage = Self::total_usage(&completed);
        CrewOutput {
            raw,
            json,
            usage,
            task_outputs: completed,
            success: true,
            metadata: Value::Null,
        }
    }

    fn partial_output(&self, completed: Vec<TaskOutput>) -> CrewOutput {
        let raw = completed
            .last()
            .map(|o| o.raw.clone())
            .unwrap_or_default();
        let json = completed.last().and_then(|o| o.json.clone());
        let usage = Self::total_usage(&completed);
        CrewOutput {
            raw,
            json,
            usage,
            task_outputs: completed,
            success: false,
            metadata: serde_json::json!({ "canceled": true }),
        }
    }
}
