//! Agents — bus subscribers with an explicit lifecycle
//!
//! Each agent subscribes to exactly one topic. `initialize` while already
//! active is rejected instead of adding a second subscription; `dispose`
//! is idempotent and may be called before `initialize`.

pub mod executor;
pub mod planner;
pub mod selection;

use crate::audit::AuditLog;
use crate::bus::{EventBus, Unsubscribe};
use crate::error::{AgentError, Result};
use crate::memory::SessionMemory;
use crate::registry::ToolRegistry;
use std::sync::{Arc, Mutex};

pub use executor::{ExecutionSummary, ExecutorAgent};
pub use planner::PlannerAgent;

/// Lifecycle state of an agent's bus subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Uninitialized,
    Active,
    Disposed,
}

/// Common lifecycle contract for agents
pub trait Agent: Send + Sync {
    /// Agent name, used in logs and errors
    fn name(&self) -> &str;

    /// Subscribe to the agent's topic
    ///
    /// Returns `AgentError::AlreadyActive` if already subscribed.
    fn initialize(&self) -> Result<()>;

    /// Unsubscribe; safe to call repeatedly
    fn dispose(&self);

    fn state(&self) -> AgentState;
}

/// Collaborators shared by all agents
#[derive(Clone)]
pub struct AgentDeps {
    pub bus: Arc<EventBus>,
    pub session_memory: Arc<dyn SessionMemory>,
    pub audit_log: Arc<dyn AuditLog>,
    pub tool_registry: Arc<dyn ToolRegistry>,
}

enum Slot {
    Uninitialized,
    Active(Unsubscribe),
    Disposed,
}

/// Tracks the single bus subscription an agent may hold
pub(crate) struct Lifecycle {
    name: &'static str,
    slot: Mutex<Slot>,
}

impl Lifecycle {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Mutex::new(Slot::Uninitialized),
        }
    }

    /// Run `subscribe` unless already active
    pub(crate) fn activate(&self, subscribe: impl FnOnce() -> Unsubscribe) -> Result<()> {
        let mut slot = self.slot.lock().map_err(|e| AgentError::Lock(e.to_string()))?;
        if matches!(*slot, Slot::Active(_)) {
            return Err(AgentError::AlreadyActive(self.name.to_string()));
        }
        let handle = subscribe();
        tracing::info!(agent = self.name, topic = %handle.topic(), "Agent initialized");
        *slot = Slot::Active(handle);
        Ok(())
    }

    pub(crate) fn deactivate(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Slot::Active(handle) = std::mem::replace(&mut *slot, Slot::Disposed) {
            handle.unsubscribe();
            tracing::info!(agent = self.name, "Agent disposed");
        }
    }

    pub(crate) fn state(&self) -> AgentState {
        match self.slot.lock() {
            Ok(slot) => match *slot {
                Slot::Uninitialized => AgentState::Uninitialized,
                Slot::Active(_) => AgentState::Active,
                Slot::Disposed => AgentState::Disposed,
            },
            Err(_) => AgentState::Disposed,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        let bus = EventBus::new();
        let lifecycle = Lifecycle::new("test");
        assert_eq!(lifecycle.state(), AgentState::Uninitialized);

        lifecycle.activate(|| bus.subscribe("t", |_| Ok(()))).unwrap();
        assert_eq!(lifecycle.state(), AgentState::Active);
        assert_eq!(bus.subscriber_count("t"), 1);

        let err = lifecycle
            .activate(|| bus.subscribe("t", |_| Ok(())))
            .unwrap_err();
        assert!(matches!(err, AgentError::AlreadyActive(ref n) if n == "test"));
        assert_eq!(bus.subscriber_count("t"), 1);

        lifecycle.deactivate();
        lifecycle.deactivate();
        assert_eq!(lifecycle.state(), AgentState::Disposed);
        assert_eq!(bus.subscriber_count("t"), 0);

        // Re-initialize after dispose is allowed
        lifecycle.activate(|| bus.subscribe("t", |_| Ok(()))).unwrap();
        assert_eq!(bus.subscriber_count("t"), 1);
        lifecycle.deactivate();
    }

    #[test]
    fn test_dispose_before_initialize() {
        let lifecycle = Lifecycle::new("test");
        lifecycle.deactivate();
        assert_eq!(lifecycle.state(), AgentState::Disposed);
    }
}
