//! An in-memory `LlmTransport` test double, grounded in the teacher's
//! `MockLlmProvider` (`memory.rs`): queue canned responses, return them in
//! FIFO order on each call, and record every request for assertion.

use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use crews_core::{CallOptions, FinishReason, Message, Response, StreamResponse, Usage};

use crate::error::{Result, TransportError};
use crate::transport::{LlmTransport, ResponseStream};

#[derive(Debug, Clone)]
pub struct MockCall {
    pub messages: Vec<String>,
    pub options: CallOptions,
}

pub struct MockLlmTransport {
    model: String,
    responses: Mutex<Vec<Response>>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockLlmTransport {
    pub fn new(model: impl Into<String>) -> Self {
        MockLlmTransport {
            model: model.into(),
            responses: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a plain-text response to be returned by the next `call`/
    /// `call_stream` invocation.
    pub fn push_text(&self, text: impl Into<String>) -> &Self {
        let text = text.into();
        self.responses.lock().unwrap().push(Response {
            content: text,
            usage: Usage::new(10, 10),
            model: self.model.clone(),
            finish_reason: FinishReason::Stop,
            tool_calls: Vec::new(),
            metadata: serde_json::json!({}),
        });
        self
    }

    pub fn push_response(&self, response: Response) -> &Self {
        self.responses.lock().unwrap().push(response);
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmTransport for MockLlmTransport {
    async fn call(&self, messages: Vec<Message>, options: &CallOptions) -> Result<Response> {
        if messages.is_empty() {
            return Err(TransportError::Validation(
                "messages must not be empty".to_string(),
            ));
        }
        options.validate()?;
        self.calls.lock().unwrap().push(MockCall {
            messages: messages.iter().map(|m| m.text()).collect(),
            options: options.clone(),
        });
        let mut queue = self.responses.lock().unwrap();
        if queue.is_empty() {
            return Err(TransportError::Provider(
                "MockLlmTransport has no queued responses".to_string(),
            ));
        }
        Ok(queue.remove(0))
    }

    async fn call_stream(
        &self,
        messages: Vec<Message>,
        options: &CallOptions,
    ) -> Result<ResponseStream> {
        let response = self.call(messages, options).await?;
        let chunks: Vec<Result<StreamResponse>> = vec![
            Ok(StreamResponse::delta(response.content.clone())),
            Ok(StreamResponse::terminal(
                Some(response.usage),
                response.finish_reason,
            )),
        ];
        Ok(Box::pin(stream::iter(chunks)))
    }

    fn supports_function_calling(&self) -> bool {
        true
    }

    fn context_window_size(&self) -> u32 {
        128_000
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_queued_responses_in_order() {
        let mock = MockLlmTransport::new("mock-model");
        mock.push_text("R1");
        mock.push_text("R2");

        let opts = CallOptions::new();
        let r1 = mock
            .call(vec![Message::user("go").unwrap()], &opts)
            .await
            .unwrap();
        let r2 = mock
            .call(vec![Message::user("go").unwrap()], &opts)
            .await
            .unwrap();

        assert_eq!(r1.content, "R1");
        assert_eq!(r2.content, "R2");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn empty_messages_rejected() {
        let mock = MockLlmTransport::new("mock-model");
        let opts = CallOptions::new();
        assert!(mock.call(vec![], &opts).await.is_err());
    }
}
