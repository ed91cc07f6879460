//! Agent (spec §3, §4.3): an LLM-backed actor with role/goal/backstory,
//! optional tools, a structured-JSON or ReAct execution mode, and
//! execution statistics.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crews_core::{CallOptions, Context, Message, Response, Tool, Usage};
use crews_llm::{LlmTransport, TransportError};

use crate::error::{EngineError, Result};
use crate::task::{Task, TaskOutput};

/// Executes a named tool with JSON arguments, returning a JSON result or an
/// error string that becomes the ReAct Observation.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, String>;
}

/// A `ToolExecutor` over a fixed table of async closures, for tests and
/// simple in-process tools.
pub struct StaticToolExecutor {
    tools: std::collections::HashMap<
        String,
        Box<dyn Fn(serde_json::Value) -> std::result::Result<serde_json::Value, String>
            + Send
            + Sync>,
    >,
}

impl Default for StaticToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticToolExecutor {
    pub fn new() -> Self {
        StaticToolExecutor {
            tools: std::collections::HashMap::new(),
        }
    }

    pub fn register<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(serde_json::Value) -> std::result::Result<serde_json::Value, String>
            + Send
            + Sync
            + 'static,
    {
        self.tools.insert(name.into(), Box::new(f));
        self
    }
}

#[async_trait]
impl ToolExecutor for StaticToolExecutor {
    async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, String> {
        match self.tools.get(name) {
            Some(f) => f(arguments),
            None => Err(format!("unknown tool: {name}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    StructuredJson,
    ReAct,
}

#[derive(Debug, Clone)]
pub struct AgentExecutionConfig {
    pub max_iterations: u32,
    pub rpm_cap: Option<u32>,
    pub total_timeout: Option<Duration>,
    pub step_timeout: Option<Duration>,
    pub verbose: bool,
    pub caching: bool,
    pub retry_cap: u32,
    pub mode: ExecutionMode,
}

impl Default for AgentExecutionConfig {
    fn default() -> Self {
        AgentExecutionConfig {
            max_iterations: 15,
            rpm_cap: None,
            total_timeout: None,
            step_timeout: None,
            verbose: false,
            caching: false,
            retry_cap: 2,
            mode: ExecutionMode::StructuredJson,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentStats {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub average_duration_ms: f64,
}

#[derive(Debug, Default)]
struct StatsInner {
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    total_duration_ms: AtomicU64,
}

/// One step of a ReAct trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReActStep {
    pub thought: Option<String>,
    pub action: Option<String>,
    pub action_input: Option<serde_json::Value>,
    pub observation: Option<String>,
    pub final_answer: Option<String>,
    pub error: Option<String>,
}

pub struct Agent {
    pub id: Uuid,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    llm: Arc<dyn LlmTransport>,
    tools: RwLock<Vec<Tool>>,
    tool_executor: Option<Arc<dyn ToolExecutor>>,
    config: RwLock<AgentExecutionConfig>,
    stats: StatsInner,
    initialized: std::sync::atomic::AtomicBool,
    /// Keyed on the serialized message transcript; populated only when
    /// `config.caching` is set (spec §3's "caching flag").
    response_cache: Mutex<HashMap<String, Response>>,
    /// Timestamps of recent LLM calls, pruned to the trailing 60s window,
    /// used to enforce `config.rpm_cap`.
    rpm_window: Mutex<VecDeque<Instant>>,
}

impl Agent {
    pub fn new(
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
        llm: Arc<dyn LlmTransport>,
    ) -> Self {
        Agent {
            id: Uuid::now_v7(),
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            llm,
            tools: RwLock::new(Vec::new()),
            tool_executor: None,
            config: RwLock::new(AgentExecutionConfig::default()),
            stats: StatsInner::default(),
            initialized: std::sync::atomic::AtomicBool::new(false),
            response_cache: Mutex::new(HashMap::new()),
            rpm_window: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_tool_executor(mut self, executor: Arc<dyn ToolExecutor>) -> Self {
        self.tool_executor = Some(executor);
        self
    }

    pub fn with_config(self, config: AgentExecutionConfig) -> Self {
        *self
            .config
            .try_write()
            .expect("config lock uncontended at construction") = config;
        self
    }

    /// Idempotent one-shot preparation. Must be called before the first
    /// `execute` (spec §4.3); subsequent calls are no-ops.
    pub async fn initialize(&self) {
        self.initialized.store(true, Ordering::SeqCst);
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn llm(&self) -> &Arc<dyn LlmTransport> {
        &self.llm
    }

    pub async fn add_tool(&self, tool: Tool) {
        self.tools.write().await.push(tool);
    }

    pub async fn set_react_mode(&self, enabled: bool) {
        let mut config = self.config.write().await;
        config.mode = if enabled {
            ExecutionMode::ReAct
        } else {
            ExecutionMode::StructuredJson
        };
    }

    pub fn stats(&self) -> AgentStats {
        let total = self.stats.total.load(Ordering::SeqCst);
        let total_duration = self.stats.total_duration_ms.load(Ordering::SeqCst);
        AgentStats {
            total,
            successful: self.stats.successful.load(Ordering::SeqCst),
            failed: self.stats.failed.load(Ordering::SeqCst),
            average_duration_ms: if total == 0 {
                0.0
            } else {
                total_duration as f64 / total as f64
            },
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are {role}.\nGoal: {goal}\nBackstory: {backstory}",
            role = self.role,
            goal = self.goal,
            backstory = self.backstory
        )
    }

    /// Executes `task` against `context` (the scheduler-prepared context
    /// map), returning a `TaskOutput` or an `EngineError`. Updates execution
    /// statistics before returning either way (spec §4.3.1).
    pub async fn execute(
        &self,
        task: &Task,
        context: &Context,
        cancel: &CancellationToken,
    ) -> Result<TaskOutput> {
        if !self.initialized.load(Ordering::SeqCst) {
            self.initialize().await;
        }

        let started = Instant::now();
        let result = self.execute_inner(task, context, cancel).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        self.stats.total.fetch_add(1, Ordering::SeqCst);
        self.stats
            .total_duration_ms
            .fetch_add(duration_ms, Ordering::SeqCst);
        match &result {
            Ok(_) => {
                self.stats.successful.fetch_add(1, Ordering::SeqCst);
            }
            Err(_) => {
                self.stats.failed.fetch_add(1, Ordering::SeqCst);
            }
        }

        result
    }

    async fn execute_inner(
        &self,
        task: &Task,
        context: &Context,
        cancel: &CancellationToken,
    ) -> Result<TaskOutput> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let mode = self.config.read().await.mode;
        let total_timeout = self.config.read().await.total_timeout;
        let prompt = format!("{}\n\nContext:\n{}", task.prompt(), context.render());

        let body = async {
            match mode {
                ExecutionMode::StructuredJson => {
                    let (content, usage) = self.call_once(&prompt, cancel).await?;
                    Ok::<_, EngineError>((content, None, usage))
                }
                ExecutionMode::ReAct => {
                    let (final_answer, steps, usage) =
                        self.run_react_loop(&prompt, cancel).await?;
                    Ok((final_answer, Some(steps), usage))
                }
            }
        };

        // Agent-level MaxExecutionTime caps the total wall-clock for one
        // task across any internal ReAct iterations (spec §5).
        let (raw, trace, usage) = match total_timeout {
            Some(limit) => match tokio::time::timeout(limit, body).await {
                Ok(result) => result?,
                Err(_) => return Err(EngineError::Timeout(limit)),
            },
            None => body.await?,
        };

        let json = serde_json::from_str::<serde_json::Value>(raw.trim()).ok();
        let metadata = match &trace {
            Some(steps) => serde_json::json!({ "react_trace": steps }),
            None => serde_json::json!({}),
        };

        Ok(TaskOutput {
            task_id: task.id,
            description: task.description.clone(),
            raw,
            agent: self.role.clone(),
            json,
            structured: None,
            metadata,
            created_at: chrono::Utc::now(),
            usage,
        })
    }

    async fn call_once(&self, prompt: &str, cancel: &CancellationToken) -> Result<(String, Usage)> {
        let messages = vec![
            Message::system(self.system_prompt())?,
            Message::user(prompt)?,
        ];
        let response = self.invoke_llm(messages, cancel).await?;
        Ok((response.content, response.usage))
    }

    /// Enforces `rpm_cap` by sleeping until the trailing 60s window has
    /// room for one more call, then records this call's timestamp.
    async fn enforce_rpm_cap(&self) {
        let cap = match self.config.read().await.rpm_cap {
            Some(cap) if cap > 0 => cap as usize,
            _ => return,
        };
        let window = Duration::from_secs(60);
        loop {
            let now = Instant::now();
            let mut calls = self.rpm_window.lock().await;
            while calls
                .front()
                .is_some_and(|t| now.duration_since(*t) >= window)
            {
                calls.pop_front();
            }
            if calls.len() < cap {
                calls.push_back(now);
                return;
            }
            let wait = window - now.duration_since(*calls.front().unwrap());
            drop(calls);
            tokio::time::sleep(wait).await;
        }
    }

    /// Sends `messages` through the transport, applying the response cache,
    /// RPM cap, per-step timeout and retry cap that make up the rest of an
    /// agent's execution configuration (spec §3). `call_once` and
    /// `run_react_loop` both funnel their single-call sites through here so
    /// the caps apply uniformly regardless of execution mode.
    async fn invoke_llm(&self, messages: Vec<Message>, cancel: &CancellationToken) -> Result<Response> {
        let config = self.config.read().await.clone();

        let cache_key = config
            .caching
            .then(|| serde_json::to_string(&messages).unwrap_or_default());
        if let Some(key) = &cache_key {
            if let Some(cached) = self.response_cache.lock().await.get(key).cloned() {
                return Ok(cached);
            }
        }

        let options = CallOptions::new();
        let mut last_err = None;
        for attempt in 0..=config.retry_cap {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            self.enforce_rpm_cap().await;

            let call = self.llm.call(messages.clone(), &options);
            let outcome = match config.step_timeout {
                Some(limit) => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                        result = tokio::time::timeout(limit, call) => match result {
                            Ok(inner) => inner,
                            Err(_) => Err(TransportError::Timeout(limit)),
                        },
                    }
                }
                None => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                        result = call => result,
                    }
                }
            };

            match outcome {
                Ok(response) => {
                    if let Some(key) = cache_key {
                        self.response_cache
                            .lock()
                            .await
                            .insert(key, response.clone());
                    }
                    return Ok(response);
                }
                Err(err)
                    if (err.is_retryable() || matches!(err, TransportError::Timeout(_)))
                        && attempt < config.retry_cap =>
                {
                    last_err = Some(err);
                    continue;
                }
                Err(err) => return Err(EngineError::from(err)),
            }
        }

        Err(EngineError::from(
            last_err.unwrap_or(TransportError::Internal(anyhow::anyhow!(
                "retry loop exited without a result"
            ))),
        ))
    }

    /// Runs the Thought/Action/Action-Input/Observation loop (spec §4.3).
    /// Terminates on a Final Answer or when `max_iterations` is exhausted.
    /// On a parse failure, falls back to treating the raw response as the
    /// final answer directly (structured-JSON style) for the remainder of
    /// the turn, per spec's "if fallback is permitted, switch to
    /// structured-JSON for the remaining turn".
    async fn run_react_loop(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<(String, Vec<ReActStep>, Usage)> {
        let max_iterations = self.config.read().await.max_iterations;
        let react_instructions = "Respond using the format:\nThought: <reasoning>\nAction: <tool name>\nAction Input: <JSON arguments>\nor, when done:\nThought: <reasoning>\nFinal Answer: <answer>";

        let mut transcript = vec![
            Message::system(self.system_prompt())?,
            Message::user(format!("{prompt}\n\n{react_instructions}"))?,
        ];
        let mut steps = Vec::new();
        let mut usage = Usage::default();

        for _ in 0..max_iterations {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let response = self.invoke_llm(transcript.clone(), cancel).await?;
            usage = usage + response.usage;

            match parse_react_segment(&response.content) {
                ReActSegment::FinalAnswer(answer) => {
                    steps.push(ReActStep {
                        thought: extract_thought(&response.content),
                        action: None,
                        action_input: None,
                        observation: None,
                        final_answer: Some(answer.clone()),
                        error: None,
                    });
                    return Ok((answer, steps, usage));
                }
                ReActSegment::Action { action, input } => {
                    let observation = match &self.tool_executor {
                        Some(executor) => {
                            match executor.execute(&action, input.clone()).await {
                                Ok(value) => value.to_string(),
                                Err(err) => format!("Error: {err}"),
                            }
                        }
                        None => "Error: no tool executor configured".to_string(),
                    };
                    steps.push(ReActStep {
                        thought: extract_thought(&response.content),
                        action: Some(action.clone()),
                        action_input: Some(input),
                        observation: Some(observation.clone()),
                        final_answer: None,
                        error: None,
                    });
                    transcript.push(Message::assistant(&response.content)?);
                    transcript.push(Message::user(format!("Observation: {observation}"))?);
                }
                ReActSegment::Unparseable => {
                    steps.push(ReActStep {
                        thought: None,
                        action: None,
                        observation: None,
                        action_input: None,
                        final_answer: None,
                        error: Some("failed to parse Thought/Action/Final Answer segment; treating raw response as final answer".to_string()),
                    });
                    return Ok((response.content, steps, usage));
                }
            }
        }

        Err(EngineError::Execution {
            task_id: Uuid::nil(),
            phase: "react_loop".to_string(),
            iteration: max_iterations as usize,
            source: Box::new(EngineError::Validation(
                "max ReAct iterations exhausted without a final answer".to_string(),
            )),
        })
    }
}

enum ReActSegment {
    FinalAnswer(String),
    Action {
        action: String,
        input: serde_json::Value,
    },
    Unparseable,
}

fn extract_thought(text: &str) -> Option<String> {
    let re = Regex::new(r"(?s)Thought:\s*(.+?)(?:\n(?:Action|Final Answer):|\z)").ok()?;
    re.captures(text)
        .map(|c| c.get(1).unwrap().as_str().trim().to_string())
}

fn parse_react_segment(text: &str) -> ReActSegment {
    if let Some(caps) = Regex::new(r"(?s)Final Answer:\s*(.+)\z")
        .ok()
        .and_then(|re| re.captures(text))
    {
        return ReActSegment::FinalAnswer(caps.get(1).unwrap().as_str().trim().to_string());
    }

    let action_re = Regex::new(r"(?s)Action:\s*(.+?)\nAction Input:\s*(.+)\z").ok();
    if let Some(caps) = action_re.and_then(|re| re.captures(text)) {
        let action = caps.get(1).unwrap().as_str().trim().to_string();
        let raw_input = caps.get(2).unwrap().as_str().trim();
        let input = serde_json::from_str(raw_input)
            .unwrap_or_else(|_| serde_json::json!({ "raw": raw_input }));
        return ReActSegment::Action { action, input };
    }

    ReActSegment::Unparseable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crews_llm::{MockLlmTransport, ResponseStream};

    /// A transport that never resolves, for exercising `total_timeout` and
    /// `step_timeout` without a real slow dependency.
    struct HangingLlmTransport;

    #[async_trait]
    impl LlmTransport for HangingLlmTransport {
        async fn call(&self, _messages: Vec<Message>, _options: &CallOptions) -> crews_llm::Result<Response> {
            std::future::pending().await
        }

        async fn call_stream(
            &self,
            _messages: Vec<Message>,
            _options: &CallOptions,
        ) -> crews_llm::Result<ResponseStream> {
            std::future::pending().await
        }

        fn supports_function_calling(&self) -> bool {
            false
        }

        fn context_window_size(&self) -> u32 {
            8192
        }

        fn model(&self) -> &str {
            "hanging"
        }
    }

    /// A transport that fails with a retryable transport error `fail_times`
    /// times before returning a canned success.
    struct FlakyLlmTransport {
        fail_times: std::sync::atomic::AtomicU32,
    }

    impl FlakyLlmTransport {
        fn new(fail_times: u32) -> Self {
            FlakyLlmTransport {
                fail_times: std::sync::atomic::AtomicU32::new(fail_times),
            }
        }
    }

    #[async_trait]
    impl LlmTransport for FlakyLlmTransport {
        async fn call(&self, _messages: Vec<Message>, _options: &CallOptions) -> crews_llm::Result<Response> {
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                return Err(TransportError::Transport("connection reset".to_string()));
            }
            Ok(Response {
                content: "recovered".to_string(),
                usage: Usage::new(1, 1),
                model: "flaky".to_string(),
                finish_reason: crews_core::FinishReason::Stop,
                tool_calls: Vec::new(),
                metadata: serde_json::json!({}),
            })
        }

        async fn call_stream(
            &self,
            messages: Vec<Message>,
            options: &CallOptions,
        ) -> crews_llm::Result<ResponseStream> {
            let response = self.call(messages, options).await?;
            let chunk = crews_core::StreamResponse::terminal(Some(response.usage), response.finish_reason);
            Ok(Box::pin(futures::stream::once(async move { Ok(chunk) })))
        }

        fn supports_function_calling(&self) -> bool {
            false
        }

        fn context_window_size(&self) -> u32 {
            8192
        }

        fn model(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn total_timeout_aborts_a_hanging_execution() {
        let agent = Agent::new("Stalled", "never finishes", "a slow agent", Arc::new(HangingLlmTransport))
            .with_config(AgentExecutionConfig {
                total_timeout: Some(Duration::from_millis(20)),
                ..AgentExecutionConfig::default()
            });

        let task = Task::new("do something", "anything");
        let context = Context::from_inputs(&std::collections::BTreeMap::new());
        let cancel = CancellationToken::new();

        let result = agent.execute(&task, &context, &cancel).await;
        assert!(matches!(result, Err(EngineError::Timeout(_))));
    }

    #[tokio::test]
    async fn retry_cap_recovers_from_transient_transport_errors() {
        let agent = Agent::new(
            "Resilient",
            "retries past blips",
            "a patient agent",
            Arc::new(FlakyLlmTransport::new(2)),
        )
        .with_config(AgentExecutionConfig {
            retry_cap: 2,
            ..AgentExecutionConfig::default()
        });

        let task = Task::new("do something", "anything");
        let context = Context::from_inputs(&std::collections::BTreeMap::new());
        let cancel = CancellationToken::new();

        let output = agent
            .execute(&task, &context, &cancel)
            .await
            .expect("should recover within the retry cap");
        assert_eq!(output.raw, "recovered");
    }

    #[tokio::test]
    async fn retry_cap_exhausted_surfaces_the_transport_error() {
        let agent = Agent::new(
            "Unlucky",
            "runs out of retries",
            "an unlucky agent",
            Arc::new(FlakyLlmTransport::new(5)),
        )
        .with_config(AgentExecutionConfig {
            retry_cap: 1,
            ..AgentExecutionConfig::default()
        });

        let task = Task::new("do something", "anything");
        let context = Context::from_inputs(&std::collections::BTreeMap::new());
        let cancel = CancellationToken::new();

        let result = agent.execute(&task, &context, &cancel).await;
        assert!(matches!(result, Err(EngineError::Transport(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn rpm_cap_delays_calls_beyond_the_window() {
        let llm = Arc::new(MockLlmTransport::new("mock-model"));
        llm.push_text("first");
        llm.push_text("second");

        let agent = Agent::new("Throttled", "respects rpm", "a careful agent", llm).with_config(
            AgentExecutionConfig {
                rpm_cap: Some(1),
                ..AgentExecutionConfig::default()
            },
        );

        agent.enforce_rpm_cap().await;

        let second = tokio::time::timeout(Duration::from_millis(10), agent.enforce_rpm_cap());
        assert!(second.await.is_err(), "second call within the window should be delayed");

        tokio::time::advance(Duration::from_secs(61)).await;
        agent.enforce_rpm_cap().await;
    }

    #[tokio::test]
    async fn caching_skips_a_repeated_call_to_the_transport() {
        let llm = Arc::new(MockLlmTransport::new("mock-model"));
        llm.push_text("only response");

        let agent = Agent::new("Cached", "avoids duplicate calls", "a frugal agent", llm.clone())
            .with_config(AgentExecutionConfig {
                caching: true,
                ..AgentExecutionConfig::default()
            });

        let task = Task::new("do something", "anything");
        let context = Context::from_inputs(&std::collections::BTreeMap::new());
        let cancel = CancellationToken::new();

        let first = agent.execute(&task, &context, &cancel).await.unwrap();
        assert_eq!(first.raw, "only response");
        assert_eq!(llm.call_count(), 1);

        let second = agent.execute(&task, &context, &cancel).await.unwrap();
        assert_eq!(second.raw, "only response");
        assert_eq!(llm.call_count(), 1, "second identical call should hit the cache");
    }

    #[test]
    fn parses_final_answer_segment() {
        let text = "Thought: I'm done\nFinal Answer: 42";
        match parse_react_segment(text) {
            ReActSegment::FinalAnswer(answer) => assert_eq!(answer, "42"),
            _ => panic!("expected final answer"),
        }
    }

    #[test]
    fn parses_action_segment() {
        let text = "Thought: need data\nAction: lookup\nAction Input: {\"q\": \"rust\"}";
        match parse_react_segment(text) {
            ReActSegment::Action { action, input } => {
                assert_eq!(action, "lookup");
                assert_eq!(input["q"], "rust");
            }
            _ => panic!("expected action"),
        }
    }

    #[test]
    fn unparseable_text_falls_back() {
        let text = "I have no idea what format this is";
        assert!(matches!(
            parse_react_segment(text),
            ReActSegment::Unparseable
        ));
    }
}
