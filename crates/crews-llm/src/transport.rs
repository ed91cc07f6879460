//! The provider-agnostic `LlmTransport` contract (spec §4.2).

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;

use crews_core::{CallOptions, Message, Response, StreamResponse};

use crate::error::{Result, TransportError};

pub type ResponseStream = BoxStream<'static, Result<StreamResponse>>;

/// Wraps a `ResponseStream` so that cancellation of `cancel` closes the
/// underlying stream and surfaces one final chunk carrying the cancellation
/// error, per spec §4.2's "CallStream ... Ctx cancellation: closes the
/// underlying transport and emits one final chunk carrying the cancellation
/// error, then closes the sequence." This is a suspension point between
/// stream-chunk reads (spec §5).
pub fn cancellable(inner: ResponseStream, cancel: CancellationToken) -> ResponseStream {
    Box::pin(stream::unfold(
        (inner, cancel, false),
        move |(mut inner, cancel, done)| async move {
            if done {
                return None;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    Some((Ok(StreamResponse::error(TransportError::Cancelled.to_string())), (inner, cancel, true)))
                }
                next = inner.next() => {
                    next.map(|item| (item, (inner, cancel, false)))
                }
            }
        },
    ))
}

#[async_trait]
pub trait LlmTransport: Send + Sync {
    /// Unary completion. Validates `options`, emits `llm_call_started`
    /// before the request and `llm_call_completed`/`llm_call_failed`
    /// afterwards, retries transient transport/5xx failures with backoff.
    async fn call(&self, messages: Vec<Message>, options: &CallOptions) -> Result<Response>;

    /// Server-sent streaming completion. Emits `llm_stream_started`, one
    /// `llm_stream_chunk` per delta, then `llm_stream_ended`. Callers that
    /// need ctx cancellation should wrap the returned stream with
    /// [`cancellable`].
    async fn call_stream(
        &self,
        messages: Vec<Message>,
        options: &CallOptions,
    ) -> Result<ResponseStream>;

    fn supports_function_calling(&self) -> bool;

    fn context_window_size(&self) -> u32;

    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crews_core::FinishReason;
    use std::time::Duration;

    fn never_ending_stream() -> ResponseStream {
        Box::pin(stream::unfold(0u32, |n| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Some((Ok(StreamResponse::delta(format!("chunk-{n}"))), n + 1))
        }))
    }

    #[tokio::test]
    async fn cancellation_emits_one_terminal_error_chunk_then_closes() {
        let cancel = CancellationToken::new();
        let mut stream = cancellable(never_ending_stream(), cancel.clone());

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.delta, "chunk-0");

        cancel.cancel();
        let second = stream.next().await.unwrap().unwrap();
        assert!(second.error.is_some());
        assert!(second.is_terminal());

        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn uncancelled_stream_passes_chunks_through_untouched() {
        let cancel = CancellationToken::new();
        let chunks = vec![
            Ok(StreamResponse::delta("a")),
            Ok(StreamResponse::terminal(None, FinishReason::Stop)),
        ];
        let inner: ResponseStream = Box::pin(stream::iter(chunks));
        let mut stream = cancellable(inner, cancel);

        assert_eq!(stream.next().await.unwrap().unwrap().delta, "a");
        assert!(stream.next().await.unwrap().unwrap().is_terminal());
        assert!(stream.next().await.is_none());
    }
}
