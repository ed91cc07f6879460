//! The concrete chat-completions wire provider (spec §4.2.1), grounded in
//! the teacher's `OpenAIProtocolLlmProvider` (`openai.rs`): a `reqwest`
//! client posting to `<base_url>/chat/completions`, SSE parsed via
//! `eventsource-stream`, tool-call deltas accumulated by index across
//! chunks.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde_json::json;

use crews_core::{CallOptions, FinishReason, Message, Response, StreamResponse, ToolCall, Usage};
use crews_eventbus::{Event, EventBus};

use crate::cost::apply_cost;
use crate::error::{Result, TransportError};
use crate::retry::RetryPolicy;
use crate::transport::{LlmTransport, ResponseStream};
use crate::wire::{ChatCompletionResponse, ChatRequest, ChatStreamChunk};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_CONTEXT_WINDOW: u32 = 128_000;

pub struct ChatCompletionsTransport {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    retry_policy: RetryPolicy,
    event_bus: Option<Arc<dyn EventBus>>,
    producer: String,
}

impl ChatCompletionsTransport {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        ChatCompletionsTransport {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            retry_policy: RetryPolicy::default(),
            event_bus: None,
            producer: "llm-transport".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<dyn EventBus>, producer: impl Into<String>) -> Self {
        self.event_bus = Some(bus);
        self.producer = producer.into();
        self
    }

    /// Reads `CREWS_LLM_API_KEY` (falling back to `OPENAI_API_KEY` for
    /// familiarity), an optional `CREWS_LLM_BASE_URL` override, and
    /// `CREWS_LLM_MODEL` (default `gpt-4o-mini`) -- the ambient
    /// configuration story from SPEC_FULL.md §2.1, following the teacher's
    /// `from_env()` convention.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("CREWS_LLM_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| TransportError::Config("CREWS_LLM_API_KEY not set".to_string()))?;
        let model =
            std::env::var("CREWS_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let mut transport = ChatCompletionsTransport::new(api_key, model);
        if let Ok(base_url) = std::env::var("CREWS_LLM_BASE_URL") {
            transport = transport.with_base_url(base_url);
        }
        Ok(transport)
    }

    async fn emit(&self, event: Event) {
        if let Some(bus) = &self.event_bus {
            bus.emit(event).await;
        }
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn finish_reason(raw: &str) -> FinishReason {
        match raw {
            "length" => FinishReason::Length,
            "tool_calls" => FinishReason::ToolCalls,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        }
    }

    async fn post_once(&self, body: &ChatRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(TransportError::Transport(format!(
                "server error {status}"
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::Provider(format!("{status}: {text}")));
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmTransport for ChatCompletionsTransport {
    async fn call(&self, messages: Vec<Message>, options: &CallOptions) -> Result<Response> {
        if messages.is_empty() {
            return Err(TransportError::Validation(
                "messages must not be empty".to_string(),
            ));
        }
        options.validate()?;

        let body = ChatRequest::from_options(&self.model, &messages, options, false);

        self.emit(Event::LlmCallStarted {
            producer: self.producer.clone(),
            timestamp: Utc::now(),
            model: self.model.clone(),
        })
        .await;

        let started = Instant::now();
        let attempted = Arc::new(Mutex::new(0u32));
        let attempted_clone = attempted.clone();

        let result = self
            .retry_policy
            .run(|attempt| {
                *attempted_clone.lock().unwrap() = attempt;
                let body = &body;
                async move {
                    let response = self.post_once(body).await?;
                    let parsed: ChatCompletionResponse = response
                        .json()
                        .await
                        .map_err(|e| TransportError::Parse(e.to_string()))?;
                    Ok(parsed)
                }
            })
            .await;

        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(parsed) => {
                let choice = parsed
                    .choices
                    .into_iter()
                    .next()
                    .ok_or_else(|| TransportError::Parse("no choices in response".to_string()))?;

                let tool_calls = choice
                    .message
                    .tool_calls
                    .unwrap_or_default()
                    .into_iter()
                    .map(|tc| ToolCall {
                        id: tc.id,
                        name: tc.function.name,
                        arguments: serde_json::from_str(&tc.function.arguments)
                            .unwrap_or(json!({})),
                    })
                    .collect();

                let usage = parsed
                    .usage
                    .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens))
                    .unwrap_or_default();
                let usage = apply_cost(&self.model, usage);

                let finish_reason = choice
                    .finish_reason
                    .as_deref()
                    .map(Self::finish_reason)
                    .unwrap_or(FinishReason::Stop);

                self.emit(Event::LlmCallCompleted {
                    producer: self.producer.clone(),
                    timestamp: Utc::now(),
                    model: self.model.clone(),
                    usage: crews_eventbus::event::Usage {
                        prompt_tokens: usage.prompt_tokens,
                        completion_tokens: usage.completion_tokens,
                        total_tokens: usage.total_tokens,
                        cost_usd: usage.cost_usd,
                    },
                    duration_ms,
                })
                .await;

                Ok(Response {
                    content: choice.message.content.unwrap_or_default(),
                    usage,
                    model: parsed.model,
                    finish_reason,
                    tool_calls,
                    metadata: json!({}),
                })
            }
            Err(err) => {
                self.emit(Event::LlmCallFailed {
                    producer: self.producer.clone(),
                    timestamp: Utc::now(),
                    model: self.model.clone(),
                    error: err.to_string(),
                    attempt: *attempted.lock().unwrap(),
                })
                .await;
                Err(err)
            }
        }
    }

    async fn call_stream(
        &self,
        messages: Vec<Message>,
        options: &CallOptions,
    ) -> Result<ResponseStream> {
        if messages.is_empty() {
            return Err(TransportError::Validation(
                "messages must not be empty".to_string(),
            ));
        }
        options.validate()?;

        let body = ChatRequest::from_options(&self.model, &messages, options, true);
        let response = self.post_once(&body).await?;

        self.emit(Event::LlmStreamStarted {
            producer: self.producer.clone(),
            timestamp: Utc::now(),
            model: self.model.clone(),
        })
        .await;

        let byte_stream = response.bytes_stream();
        let event_stream = byte_stream.eventsource();

        let model = self.model.clone();
        let bus = self.event_bus.clone();
        let producer = self.producer.clone();
        let chunk_index = Arc::new(Mutex::new(0usize));
        let accumulated_tool_calls: Arc<Mutex<Vec<ToolCall>>> = Arc::new(Mutex::new(Vec::new()));

        let converted: ResponseStream = Box::pin(event_stream.then(move |result| {
            let model = model.clone();
            let bus = bus.clone();
            let producer = producer.clone();
            let chunk_index = chunk_index.clone();
            let accumulated_tool_calls = accumulated_tool_calls.clone();

            async move {
                let raw = match result {
                    Ok(e) => e,
                    Err(e) => return Ok(StreamResponse::error(e.to_string())),
                };

                if raw.data == "[DONE]" {
                    let count = *chunk_index.lock().unwrap();
                    if let Some(bus) = &bus {
                        bus.emit(Event::LlmStreamEnded {
                            producer: producer.clone(),
                            timestamp: Utc::now(),
                            usage: None,
                            chunk_count: count,
                        })
                        .await;
                    }
                    return Ok(StreamResponse::terminal(None, FinishReason::Stop));
                }

                let chunk: ChatStreamChunk = match serde_json::from_str(&raw.data) {
                    Ok(c) => c,
                    Err(e) => {
                        return Ok(StreamResponse::error(format!(
                            "failed to parse stream chunk: {e}"
                        )))
                    }
                };

                let Some(choice) = chunk.choices.into_iter().next() else {
                    return Ok(StreamResponse::delta(""));
                };

                if let Some(deltas) = choice.delta.tool_calls {
                    let mut acc = accumulated_tool_calls.lock().unwrap();
                    for tc in deltas {
                        let idx = tc.index as usize;
                        while acc.len() <= idx {
                            acc.push(ToolCall {
                                id: String::new(),
                                name: String::new(),
                                arguments: json!(""),
                            });
                        }
                        if let Some(id) = tc.id {
                            acc[idx].id = id;
                        }
                        if let Some(f) = tc.function {
                            if let Some(name) = f.name {
                                acc[idx].name = name;
                            }
                            if let Some(args) = f.arguments {
                                let current = acc[idx].arguments.as_str().unwrap_or("");
                                acc[idx].arguments = json!(format!("{current}{args}"));
                            }
                        }
                    }
                    return Ok(StreamResponse::delta(""));
                }

                if let Some(content) = choice.delta.content {
                    let idx = {
                        let mut guard = chunk_index.lock().unwrap();
                        let current = *guard;
                        *guard += 1;
                        current
                    };
                    if let Some(bus) = &bus {
                        bus.emit(Event::LlmStreamChunk {
                            producer: producer.clone(),
                            timestamp: Utc::now(),
                            delta: content.clone(),
                            chunk_index: idx,
                        })
                        .await;
                    }
                    return Ok(StreamResponse::delta(content));
                }

                if let Some(raw_finish) = choice.finish_reason {
                    let finish_reason = ChatCompletionsTransport::finish_reason(&raw_finish);
                    let usage = chunk.usage.map(|u| {
                        apply_cost(&model, Usage::new(u.prompt_tokens, u.completion_tokens))
                    });
                    let tool_calls = {
                        let mut acc = accumulated_tool_calls.lock().unwrap();
                        std::mem::take(&mut *acc)
                            .into_iter()
                            .map(|mut tc| {
                                if let Some(args_str) = tc.arguments.as_str() {
                                    tc.arguments =
                                        serde_json::from_str(args_str).unwrap_or(json!({}));
                                }
                                tc
                            })
                            .collect::<Vec<_>>()
                    };
                    let mut terminal = StreamResponse::terminal(usage, finish_reason);
                    terminal.tool_calls = tool_calls;
                    return Ok(terminal);
                }

                Ok(StreamResponse::delta(""))
            }
        }));

        Ok(converted)
    }

    fn supports_function_calling(&self) -> bool {
        true
    }

    fn context_window_size(&self) -> u32 {
        DEFAULT_CONTEXT_WINDOW
    }

    fn model(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for ChatCompletionsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsTransport")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
