//! Provider-agnostic LLM transport layer (spec C2): `LlmTransport`
//! (`call`/`call_stream`), the concrete chat-completions wire
//! implementation, a retry/backoff policy, a per-model cost table, and an
//! in-memory mock for tests.

pub mod chat_completions;
pub mod cost;
pub mod error;
pub mod mock;
pub mod retry;
pub mod transport;
pub mod wire;

pub use chat_completions::ChatCompletionsTransport;
pub use cost::{apply_cost, price_for_model, ModelPrice};
pub use error::{Result, TransportError};
pub use mock::MockLlmTransport;
pub use retry::RetryPolicy;
pub use transport::{LlmTransport, ResponseStream};
