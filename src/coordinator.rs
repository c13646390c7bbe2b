//! Agent coordinator — starts and stops the planner and executor as a unit
//!
//! The coordinator is the composition root: it is the only place that
//! falls back to the process-wide bus when none is injected.

use crate::agent::{Agent, AgentDeps, ExecutorAgent, PlannerAgent};
use crate::audit::{AuditLog, TracingAuditLog};
use crate::bus::{default_bus, EventBus, PublishReport};
use crate::config::AgentConfig;
use crate::error::Result;
use crate::events::{UserCommandPayload, USER_COMMAND_TOPIC};
use crate::memory::{InMemorySessionMemory, SessionMemory};
use crate::registry::ToolRegistry;
use crate::types::Metadata;
use std::sync::Arc;

/// Dependencies for [`AgentCoordinator::start`]
///
/// Only the tool registry is required.
pub struct CoordinatorOptions {
    tool_registry: Arc<dyn ToolRegistry>,
    bus: Option<Arc<EventBus>>,
    session_memory: Option<Arc<dyn SessionMemory>>,
    audit_log: Option<Arc<dyn AuditLog>>,
    config: AgentConfig,
}

impl CoordinatorOptions {
    pub fn new(tool_registry: Arc<dyn ToolRegistry>) -> Self {
        Self {
            tool_registry,
            bus: None,
            session_memory: None,
            audit_log: None,
            config: AgentConfig::default(),
        }
    }

    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_session_memory(mut self, memory: Arc<dyn SessionMemory>) -> Self {
        self.session_memory = Some(memory);
        self
    }

    pub fn with_audit_log(mut self, audit_log: Arc<dyn AuditLog>) -> Self {
        self.audit_log = Some(audit_log);
        self
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }
}

/// Running planner + executor pair sharing one bus
pub struct AgentCoordinator {
    bus: Arc<EventBus>,
    session_memory: Arc<dyn SessionMemory>,
    planner: PlannerAgent,
    executor: ExecutorAgent,
}

impl AgentCoordinator {
    /// Build both agents and subscribe them
    pub fn start(options: CoordinatorOptions) -> Result<Self> {
        options.config.validate()?;

        let bus = options.bus.unwrap_or_else(default_bus);
        let session_memory: Arc<dyn SessionMemory> = match options.session_memory {
            Some(memory) => memory,
            None => Arc::new(InMemorySessionMemory::new(options.config.memory_capacity)),
        };
        let audit_log: Arc<dyn AuditLog> = match options.audit_log {
            Some(audit_log) => audit_log,
            None => Arc::new(TracingAuditLog),
        };

        let deps = AgentDeps {
            bus: bus.clone(),
            session_memory: session_memory.clone(),
            audit_log,
            tool_registry: options.tool_registry,
        };
        let planner = PlannerAgent::new(deps.clone());
        let executor = ExecutorAgent::with_config(deps, options.config.executor);

        planner.initialize()?;
        executor.initialize()?;

        tracing::info!("Agent coordinator started");
        Ok(Self {
            bus,
            session_memory,
            planner,
            executor,
        })
    }

    /// Publish a user command on the bus
    pub fn submit(&self, command: &str, metadata: Option<Metadata>) -> Result<PublishReport> {
        let payload = UserCommandPayload {
            command: command.to_string(),
            metadata,
        };
        self.bus.publish(USER_COMMAND_TOPIC, &payload)
    }

    /// Unsubscribe both agents; idempotent
    pub fn dispose(&self) {
        self.planner.dispose();
        self.executor.dispose();
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn session_memory(&self) -> &Arc<dyn SessionMemory> {
        &self.session_memory
    }

    pub fn planner(&self) -> &PlannerAgent {
        &self.planner
    }

    pub fn executor(&self) -> &ExecutorAgent {
        &self.executor
    }
}
