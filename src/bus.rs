//! In-process publish/subscribe bus keyed by topic name
//!
//! `EventBus` decouples the agents from each other: the planner never calls
//! the executor, it publishes a plan. Payloads travel as `serde_json::Value`
//! and typed helpers (de)serialize at the edges.
//!
//! Dispatch is synchronous and ordered: `publish` snapshots the handlers
//! registered for a topic, releases the lock, then invokes them in
//! subscription order. A handler returning `Err` or panicking is logged and
//! counted in [`PublishReport::failed`]; it never prevents later handlers
//! from running and is never propagated to the publisher. Events published
//! to a topic with no subscribers are dropped.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// Subscriber callback invoked with the raw JSON payload
pub type Handler = Arc<dyn Fn(&serde_json::Value) -> Result<()> + Send + Sync>;

struct Registration {
    id: u64,
    handler: Handler,
}

#[derive(Default)]
struct Topics {
    /// topic → handlers in subscription order
    handlers: RwLock<HashMap<String, Vec<Registration>>>,
    next_id: AtomicU64,
}

impl Topics {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<Registration>>> {
        // Handlers never run under the lock, so a poisoned map is still consistent
        self.handlers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<Registration>>> {
        self.handlers.write().unwrap_or_else(|e| e.into_inner())
    }

    fn remove(&self, topic: &str, id: u64) -> bool {
        let mut handlers = self.write();
        let Some(regs) = handlers.get_mut(topic) else {
            return false;
        };
        let before = regs.len();
        regs.retain(|r| r.id != id);
        let removed = regs.len() != before;
        if regs.is_empty() {
            handlers.remove(topic);
        }
        removed
    }
}

/// Outcome of a single `publish` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Handlers that returned `Ok`
    pub delivered: usize,
    /// Handlers that returned `Err` or panicked
    pub failed: usize,
}

impl PublishReport {
    /// Total handlers invoked
    pub fn invoked(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Handle returned by [`EventBus::subscribe`]
///
/// Removes exactly the registration it was created for. Calling
/// `unsubscribe` more than once is a no-op. Dropping the handle does
/// not unsubscribe.
pub struct Unsubscribe {
    topics: Weak<Topics>,
    topic: String,
    id: u64,
    done: AtomicBool,
}

impl Unsubscribe {
    /// Remove the registration; idempotent
    pub fn unsubscribe(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(topics) = self.topics.upgrade() {
            if topics.remove(&self.topic, self.id) {
                tracing::debug!(topic = %self.topic, id = self.id, "Handler unsubscribed");
            }
        }
    }

    /// Topic this handle is bound to
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// True once `unsubscribe` has been called
    pub fn is_unsubscribed(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .field("done", &self.is_unsubscribed())
            .finish()
    }
}

/// Process-local publish/subscribe bus
///
/// Thread-safe: subscribe and unsubscribe may run concurrently with
/// `publish`, and handlers may publish re-entrantly.
#[derive(Default)]
pub struct EventBus {
    topics: Arc<Topics>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raw JSON handler for `topic`
    pub fn subscribe<F>(&self, topic: &str, handler: F) -> Unsubscribe
    where
        F: Fn(&serde_json::Value) -> Result<()> + Send + Sync + 'static,
    {
        let id = self.topics.next_id.fetch_add(1, Ordering::Relaxed);
        self.topics
            .write()
            .entry(topic.to_string())
            .or_default()
            .push(Registration {
                id,
                handler: Arc::new(handler),
            });

        tracing::debug!(topic = %topic, id, "Handler subscribed");

        Unsubscribe {
            topics: Arc::downgrade(&self.topics),
            topic: topic.to_string(),
            id,
            done: AtomicBool::new(false),
        }
    }

    /// Register a handler receiving the payload deserialized as `T`
    ///
    /// A payload that does not deserialize counts as a handler failure.
    pub fn subscribe_typed<T, F>(&self, topic: &str, handler: F) -> Unsubscribe
    where
        T: DeserializeOwned,
        F: Fn(T) -> Result<()> + Send + Sync + 'static,
    {
        self.subscribe(topic, move |value| {
            let payload: T = serde_json::from_value(value.clone())?;
            handler(payload)
        })
    }

    /// Serialize `payload` and dispatch it to every handler on `topic`
    ///
    /// Fails only if the payload cannot be serialized.
    pub fn publish<T: Serialize + ?Sized>(&self, topic: &str, payload: &T) -> Result<PublishReport> {
        let value = serde_json::to_value(payload)?;
        Ok(self.publish_value(topic, &value))
    }

    /// Dispatch a raw JSON payload to every handler on `topic`
    pub fn publish_value(&self, topic: &str, payload: &serde_json::Value) -> PublishReport {
        let handlers: Vec<(u64, Handler)> = self
            .topics
            .read()
            .get(topic)
            .map(|regs| regs.iter().map(|r| (r.id, r.handler.clone())).collect())
            .unwrap_or_default();

        let mut report = PublishReport::default();
        if handlers.is_empty() {
            tracing::debug!(topic = %topic, "No subscribers, event dropped");
            return report;
        }

        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(payload))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!(topic = %topic, id, error = %e, "Event handler failed");
                }
                Err(panic) => {
                    report.failed += 1;
                    tracing::warn!(
                        topic = %topic,
                        id,
                        panic = %panic_message(panic.as_ref()),
                        "Event handler panicked"
                    );
                }
            }
        }

        tracing::debug!(
            topic = %topic,
            delivered = report.delivered,
            failed = report.failed,
            "Event dispatched"
        );
        report
    }

    /// Number of handlers currently registered for `topic`
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.read().get(topic).map_or(0, Vec::len)
    }

    /// Topics with at least one handler
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.topics.read().keys().cloned().collect();
        topics.sort();
        topics
    }
}

/// The process-wide bus used when no bus is injected
///
/// Only the composition root should reach for this; agents take the bus
/// as a constructor argument.
pub fn default_bus() -> Arc<EventBus> {
    static BUS: OnceLock<Arc<EventBus>> = OnceLock::new();
    BUS.get_or_init(|| Arc::new(EventBus::new())).clone()
}

/// Readable text from a caught panic payload
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
