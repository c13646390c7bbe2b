//! # a3s-agent
//!
//! Planner/executor agent pipeline over an in-process publish/subscribe bus.
//!
//! ## Overview
//!
//! A caller publishes a free-text command on the `user-command` topic. The
//! planner turns it into an ordered [`ExecutionPlan`] of tool invocations and
//! publishes it on `plan-created`. The executor runs the plan step by step
//! against a [`ToolRegistry`], publishing one `execution-result` per attempted
//! step and stopping at the first failure.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_agent::{AgentCoordinator, CoordinatorOptions, EventBus, FnToolRegistry};
//! use std::sync::Arc;
//!
//! # async fn example() -> a3s_agent::Result<()> {
//! let registry = FnToolRegistry::new().with_tool(
//!     "clickup_create_task",
//!     "Create a ClickUp task",
//!     |args| async move { Ok(serde_json::json!({ "created": args["name"] })) },
//! )?;
//!
//! let coordinator = AgentCoordinator::start(
//!     CoordinatorOptions::new(Arc::new(registry)).with_bus(Arc::new(EventBus::new())),
//! )?;
//!
//! coordinator.submit("please create a task called Buy milk", None)?;
//! coordinator.dispose();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **EventBus** — topic-keyed, ordered, per-handler error isolation
//! - **PlannerAgent** — keyword/metadata tool selection and argument building
//! - **ExecutorAgent** — sequential execution, short-circuit on failure
//! - **AgentCoordinator** — wires both agents and tears them down together
//! - **ToolRegistry / SessionMemory / AuditLog** — collaborator traits

pub mod agent;
pub mod audit;
pub mod bus;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod memory;
pub mod registry;
pub mod types;

// Re-export core types
pub use agent::{Agent, AgentDeps, AgentState, ExecutionSummary, ExecutorAgent, PlannerAgent};
pub use audit::{AuditEntry, AuditLevel, AuditLog, MemoryAuditLog, TracingAuditLog};
pub use bus::{default_bus, EventBus, PublishReport, Unsubscribe};
pub use config::{AgentConfig, ExecutorConfig, RetryPolicy};
pub use coordinator::{AgentCoordinator, CoordinatorOptions};
pub use error::{AgentError, Result};
pub use events::{
    ExecutionResultPayload, UserCommandPayload, EXECUTION_RESULT_TOPIC, PLAN_CREATED_TOPIC,
    USER_COMMAND_TOPIC,
};
pub use memory::{InMemorySessionMemory, MemoryEntry, MemoryRecord, SessionMemory};
pub use registry::{FnToolRegistry, SerializedToolRegistry, ToolRegistry};
pub use types::{Args, ExecutionPlan, ExecutionStep, Metadata, ToolManifest};
