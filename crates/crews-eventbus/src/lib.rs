//! Typed, in-process publish/subscribe event bus (spec C1).
//!
//! `Event` is a closed tagged-variant enum covering the vocabulary in spec
//! §6. Two `EventBus` implementations are provided: `InMemoryEventBus`
//! (synchronous dispatch plus a recorded log, used by the scenario tests)
//! and `WorkerPoolEventBus` (bounded per-subscriber queues, used in
//! production to decouple a slow subscriber from the emitting producer).

pub mod bus;
pub mod event;
pub mod memory;
pub mod worker_pool;

pub use bus::{EventBus, EventHandler, EventTypeFilter, FnHandler, SubscriptionId};
pub use event::Event;
pub use memory::InMemoryEventBus;
pub use worker_pool::WorkerPoolEventBus;
