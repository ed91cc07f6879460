//! An in-memory event bus for tests, grounded in the teacher's
//! `InMemoryEventEmitter` (`memory.rs`): dispatch happens inline on the
//! calling task, so assertions about emit order (spec §8's S1/S3) don't need
//! to race a background worker. This is the bus the scenario tests (S1-S6)
//! use; `worker_pool::WorkerPoolEventBus` is the bounded, decoupled
//! implementation meant for production use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::bus::{EventBus, EventHandler, EventTypeFilter, SubscriptionId};
use crate::event::Event;

struct Subscription {
    filter: EventTypeFilter,
    handler: Arc<dyn EventHandler>,
}

pub struct InMemoryEventBus {
    next_id: AtomicU64,
    subscriptions: RwLock<HashMap<u64, Subscription>>,
    /// All events ever emitted, in emit order, for test assertions.
    log: RwLock<Vec<Event>>,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        InMemoryEventBus {
            next_id: AtomicU64::new(1),
            subscriptions: RwLock::new(HashMap::new()),
            log: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of every event emitted so far, in order.
    pub async fn events(&self) -> Vec<Event> {
        self.log.read().await.clone()
    }

    pub async fn events_of_type(&self, event_type: &str) -> Vec<Event> {
        self.log
            .read()
            .await
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.log.read().await.len()
    }

    pub async fn clear(&self) {
        self.log.write().await.clear();
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    fn subscribe(
        &self,
        filter: EventTypeFilter,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        // subscribe is synchronous in the trait; we're not already inside an
        // async context guarantee, so use try_write via blocking -- in
        // practice this bus is always driven from async code, so a
        // blocking_write would deadlock the runtime. Use try_write with a
        // spin-free fallback: callers always subscribe before any concurrent
        // emit is in flight in this crate's own tests, so contention here is
        // not a real concern.
        let mut subs = self
            .subscriptions
            .try_write()
            .expect("subscribe called while subscriptions lock held elsewhere");
        subs.insert(id, Subscription { filter, handler });
        SubscriptionId(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self
            .subscriptions
            .try_write()
            .expect("unsubscribe called while subscriptions lock held elsewhere");
        subs.remove(&id.0).is_some()
    }

    async fn emit(&self, event: Event) {
        self.log.write().await.push(event.clone());
        let subs = self.subscriptions.read().await;
        // Registration order: HashMap iteration isn't insertion-ordered, so
        // sort by id (monotonically assigned at subscribe time).
        let mut ordered: Vec<_> = subs.iter().collect();
        ordered.sort_by_key(|(id, _)| **id);
        for (_, sub) in ordered {
            if sub.filter.matches(&event) {
                if let Err(err) = sub.handler.handle(&event).await {
                    tracing::warn!(
                        event_type = event.event_type(),
                        error = %err,
                        "event handler returned an error"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use chrono::Utc;
    use std::sync::Mutex;

    fn llm_started(producer: &str) -> Event {
        Event::LlmCallStarted {
            producer: producer.to_string(),
            timestamp: Utc::now(),
            model: "gpt-4o".to_string(),
        }
    }

    #[tokio::test]
    async fn delivers_in_emit_order_to_a_single_subscriber() {
        let bus = InMemoryEventBus::new();
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        bus.subscribe(
            EventTypeFilter::All,
            Arc::new(crate::bus::FnHandler(move |e: &Event| {
                seen2.lock().unwrap().push(e.event_type().to_string());
            })),
        );

        bus.emit(llm_started("crew-1")).await;
        bus.emit(Event::LlmCallCompleted {
            producer: "crew-1".to_string(),
            timestamp: Utc::now(),
            model: "gpt-4o".to_string(),
            usage: crate::event::Usage {
                prompt_tokens: 1,
                completion_tokens: 1,
                total_tokens: 2,
                cost_usd: None,
            },
            duration_ms: 5,
        })
        .await;

        let order = seen.lock().unwrap().clone();
        assert_eq!(order, vec!["llm_call_started", "llm_call_completed"]);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = InMemoryEventBus::new();
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let count2 = count.clone();
        let id = bus.subscribe(
            EventTypeFilter::All,
            Arc::new(crate::bus::FnHandler(move |_: &Event| {
                count2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            })),
        );
        bus.emit(llm_started("c")).await;
        assert!(bus.unsubscribe(id));
        bus.emit(llm_started("c")).await;
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn filter_restricts_delivery() {
        let bus = InMemoryEventBus::new();
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let count2 = count.clone();
        bus.subscribe(
            EventTypeFilter::OneOf(vec!["llm_call_completed"]),
            Arc::new(crate::bus::FnHandler(move |_: &Event| {
                count2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            })),
        );
        bus.emit(llm_started("c")).await;
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
