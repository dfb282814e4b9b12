//! Event Bus (C1): process-local, topic-keyed pub/sub
//!
//! Delivery is serial and FIFO per topic; cross-topic ordering is
//! undefined. A slow handler on one topic never delays another topic's
//! delivery task. Handler failures are logged and swallowed — one bad
//! subscriber must not block the others.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{Notify, RwLock};

use crate::core::constants::{EVENT_BUS_MAX_QUEUE_DEPTH, TOPIC_JOB_UPDATE, TOPIC_STREAM_END};

/// A published event: a topic tag plus an opaque JSON payload.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub topic: String,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    /// Terminal events (`stream.end`, or a `job.update` reaching
    /// `completed`/`failed`) are never dropped under backpressure.
    fn is_terminal(&self) -> bool {
        if self.topic == TOPIC_STREAM_END {
            return true;
        }
        if self.topic == TOPIC_JOB_UPDATE {
            return self
                .payload
                .get("status")
                .and_then(|s| s.as_str())
                .is_some_and(|s| s == "completed" || s == "failed");
        }
        false
    }
}

type BoxFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;
type Handler = Arc<dyn Fn(Event) -> BoxFuture + Send + Sync>;

struct Topic {
    handlers: RwLock<Vec<Handler>>,
    queue: Mutex<VecDeque<Event>>,
    notify: Notify,
}

/// Process-local event bus. Cheap to clone (internally `Arc`-backed via
/// `DashMap`), intended to be held as a single shared instance.
pub struct EventBus {
    topics: DashMap<String, Arc<Topic>>,
    max_queue_depth: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_max_queue_depth(EVENT_BUS_MAX_QUEUE_DEPTH)
    }

    pub fn with_max_queue_depth(max_queue_depth: usize) -> Self {
        Self {
            topics: DashMap::new(),
            max_queue_depth,
        }
    }

    fn topic(&self, name: &str) -> Arc<Topic> {
        if let Some(t) = self.topics.get(name) {
            return t.clone();
        }
        let topic = Arc::new(Topic {
            handlers: RwLock::new(Vec::new()),
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        });
        self.topics.insert(name.to_string(), topic.clone());
        spawn_delivery_task(name.to_string(), topic.clone());
        topic
    }

    /// Register a suspending handler for `topic`. Handlers run serially,
    /// in publish order, for as long as the bus is alive.
    pub async fn subscribe<F, Fut>(&self, topic: &str, handler: F)
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let t = self.topic(topic);
        let boxed: Handler = Arc::new(move |e| Box::pin(handler(e)));
        t.handlers.write().await.push(boxed);
    }

    /// Deliver `payload` to every current subscriber of `topic`.
    pub fn publish(&self, topic: &str, payload: serde_json::Value) {
        let t = self.topic(topic);
        let event = Event::new(topic, payload);

        let mut queue = t.queue.lock();
        if queue.len() >= self.max_queue_depth {
            if let Some(pos) = queue.iter().position(|e| !e.is_terminal()) {
                queue.remove(pos);
                tracing::warn!(topic, "event bus queue full, dropped oldest non-terminal event");
            } else {
                tracing::warn!(
                    topic,
                    "event bus queue full of terminal events, exceeding cap rather than dropping one"
                );
            }
        }
        queue.push_back(event);
        drop(queue);
        t.notify.notify_one();
    }
}

fn spawn_delivery_task(topic_name: String, topic: Arc<Topic>) {
    tokio::spawn(async move {
        loop {
            let event = loop {
                if let Some(e) = topic.queue.lock().pop_front() {
                    break e;
                }
                topic.notify.notified().await;
            };

            let handlers = topic.handlers.read().await.clone();
            for handler in handlers {
                if let Err(e) = handler(event.clone()).await {
                    tracing::warn!(topic = %topic_name, error = %e, "event bus handler failed");
                }
            }
        }
    });
}
