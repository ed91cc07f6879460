//! The `EventBus` contract (spec §4.1): `Subscribe`/`Emit`/`Unsubscribe`.

use async_trait::async_trait;

use crate::event::Event;

/// Which events a subscription should receive. `All` subscribes to every
/// event type; `OneOf` restricts to a fixed set of `Event::event_type()`
/// strings (the spec's dot-notation vocabulary, e.g. `"llm_call_started"`).
#[derive(Debug, Clone)]
pub enum EventTypeFilter {
    All,
    OneOf(Vec<&'static str>),
}

impl EventTypeFilter {
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            EventTypeFilter::All => true,
            EventTypeFilter::OneOf(types) => types.contains(&event.event_type()),
        }
    }
}

/// A registered event handler. Handler errors are logged by the bus and do
/// not abort other handlers or the emitter (spec §4.1).
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> Result<(), String>;
}

/// Adapter letting a plain synchronous closure act as a handler, for the
/// common case of a test assertion or a cheap in-process callback.
pub struct FnHandler<F>(pub F)
where
    F: Fn(&Event) + Send + Sync;

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&Event) + Send + Sync,
{
    async fn handle(&self, event: &Event) -> Result<(), String> {
        (self.0)(event);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Typed, in-process publish/subscribe substrate (spec C1).
///
/// Ordering guarantee: events from a single producer to a single subscriber
/// are delivered in emit order. There is no cross-producer ordering
/// guarantee (spec §5).
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Registers a handler for events matching `filter`; handlers for the
    /// same filter are invoked in registration order.
    fn subscribe(
        &self,
        filter: EventTypeFilter,
        handler: std::sync::Arc<dyn EventHandler>,
    ) -> SubscriptionId;

    /// Best-effort removal. Returns `true` if a subscription with this id
    /// existed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Dispatches `event` to all matching subscribers. Must not block on a
    /// slow handler for longer than a bounded time (spec §4.1) -- concrete
    /// implementations are free to dispatch asynchronously from a bounded
    /// queue, dropping or logging when it saturates.
    async fn emit(&self, event: Event);
}
