//! Production event bus: a bounded-queue, per-subscriber worker task,
//! replacing the "ad-hoc goroutine-spawn-per-callback" pattern Design Note
//! §9 calls out. Each subscription gets its own bounded `mpsc` channel and a
//! single background task draining it in order, so:
//!
//! - `emit` never blocks the producer: it's a non-blocking `try_send`.
//! - per-subscriber ordering is preserved: one channel, one consumer.
//! - a saturated subscriber drops the event and logs, rather than stalling
//!   or unbounded-buffering.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};

use crate::bus::{EventBus, EventHandler, EventTypeFilter, SubscriptionId};
use crate::event::Event;

const DEFAULT_QUEUE_CAPACITY: usize = 256;

struct Subscription {
    filter: EventTypeFilter,
    sender: mpsc::Sender<Event>,
    // Keeps the worker task alive for as long as the subscription exists;
    // dropping it signals the worker to shut down once the channel drains.
    _worker: tokio::task::JoinHandle<()>,
}

pub struct WorkerPoolEventBus {
    next_id: AtomicU64,
    subscriptions: RwLock<HashMap<u64, Subscription>>,
    queue_capacity: usize,
}

impl Default for WorkerPoolEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl WorkerPoolEventBus {
    pub fn new(queue_capacity: usize) -> Self {
        WorkerPoolEventBus {
            next_id: AtomicU64::new(1),
            subscriptions: RwLock::new(HashMap::new()),
            queue_capacity,
        }
    }
}

#[async_trait]
impl EventBus for WorkerPoolEventBus {
    fn subscribe(
        &self,
        filter: EventTypeFilter,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, mut rx) = mpsc::channel::<Event>(self.queue_capacity);
        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(err) = handler.handle(&event).await {
                    tracing::warn!(
                        event_type = event.event_type(),
                        error = %err,
                        "event handler returned an error"
                    );
                }
            }
        });
        let mut subs = self
            .subscriptions
            .try_write()
            .expect("subscribe called while subscriptions lock held elsewhere");
        subs.insert(
            id,
            Subscription {
                filter,
                sender: tx,
                _worker: worker,
            },
        );
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
        let subs = self.subscriptions.read().await;
        let mut ordered: Vec<_> = subs.iter().collect();
        ordered.sort_by_key(|(id, _)| **id);
        for (_, sub) in ordered {
            if sub.filter.matches(&event) {
                match sub.sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(
                            event_type = event.event_type(),
                            "subscriber queue saturated, dropping event"
                        );
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        tracing::warn!(
                            event_type = event.event_type(),
                            "subscriber worker gone, dropping event"
                        );
                    }
                }
            }
        }
    }
}
