//! Planner agent — turns a user command into an execution plan
//!
//! One `user-command` event yields at most one `plan-created` event. The
//! raw command is always recorded in session memory first; if plan
//! construction fails the failure is audited and nothing is published.

use super::selection::{build_args, describe_step, select_tools};
use super::{Agent, AgentDeps, AgentState, Lifecycle};
use crate::error::Result;
use crate::events::{UserCommandPayload, PLAN_CREATED_TOPIC, USER_COMMAND_TOPIC};
use crate::types::{ExecutionPlan, ExecutionStep, Metadata, ToolManifest};
use std::sync::{Arc, Weak};

/// Subscribes to `user-command` and publishes `plan-created`
pub struct PlannerAgent {
    inner: Arc<Planner>,
    lifecycle: Lifecycle,
}

/// Planning logic, independent of the bus subscription
pub struct Planner {
    deps: AgentDeps,
}

impl PlannerAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self {
            inner: Arc::new(Planner { deps }),
            lifecycle: Lifecycle::new("planner"),
        }
    }

    /// Planning logic, for direct use without the bus
    pub fn planner(&self) -> &Planner {
        &self.inner
    }
}

impl Agent for PlannerAgent {
    fn name(&self) -> &str {
        self.lifecycle.name()
    }

    fn initialize(&self) -> Result<()> {
        let bus = self.inner.deps.bus.clone();
        let planner: Weak<Planner> = Arc::downgrade(&self.inner);
        self.lifecycle.activate(|| {
            bus.subscribe_typed::<UserCommandPayload, _>(USER_COMMAND_TOPIC, move |payload| {
                match planner.upgrade() {
                    Some(planner) => planner.handle_command(&payload).map(|_| ()),
                    None => Ok(()),
                }
            })
        })
    }

    fn dispose(&self) {
        self.lifecycle.deactivate();
    }

    fn state(&self) -> AgentState {
        self.lifecycle.state()
    }
}

impl Drop for PlannerAgent {
    fn drop(&mut self) {
        self.lifecycle.deactivate();
    }
}

impl Planner {
    /// Record, plan, and publish for one command
    ///
    /// Returns the published plan. On a planning error the command is
    /// still recorded and the error is audited before being returned.
    pub fn handle_command(&self, payload: &UserCommandPayload) -> Result<ExecutionPlan> {
        let deps = &self.deps;
        deps.session_memory
            .record_command(&payload.command, payload.metadata.as_ref());
        deps.audit_log.info(
            "Received user command",
            Some(serde_json::json!({ "command": payload.command })),
        );

        let plan = match self.build_plan(&payload.command, payload.metadata.as_ref()) {
            Ok(plan) => plan,
            Err(e) => {
                deps.audit_log.error(
                    "Failed to build execution plan",
                    Some(serde_json::json!({
                        "command": payload.command,
                        "error": e.to_string(),
                    })),
                );
                return Err(e);
            }
        };

        deps.session_memory.record_plan(&plan);
        deps.audit_log.info(
            "Generated execution plan",
            Some(serde_json::json!({ "planId": plan.plan_id, "steps": plan.steps.len() })),
        );

        deps.bus.publish(PLAN_CREATED_TOPIC, &plan)?;
        Ok(plan)
    }

    /// Build a plan against the registry's current manifest
    ///
    /// Tools whose arguments cannot be derived are left out; the remaining
    /// steps are numbered 1..=N in selection order.
    ///
    /// The first-manifest-tool fallback reaches further than
    /// [`select_tools`]: it also applies when tools were selected but every
    /// one of them was skipped, provided the first manifest tool was not
    /// among them. A selection that was entirely skipped therefore still
    /// yields one step when the registry offers another tool.
    pub fn build_plan(&self, command: &str, metadata: Option<&Metadata>) -> Result<ExecutionPlan> {
        let manifest = self.deps.tool_registry.manifest();
        let selected = select_tools(&manifest, command, metadata);

        let mut steps: Vec<ExecutionStep> = Vec::with_capacity(selected.len());
        for tool in &selected {
            push_step(&mut steps, tool, command, metadata)?;
        }

        // Every selected tool was skipped: still try the first manifest tool
        if steps.is_empty() {
            if let Some(first) = manifest.first().filter(|t| !selected.contains(t)) {
                push_step(&mut steps, first, command, metadata)?;
            }
        }

        Ok(ExecutionPlan::new(command, steps))
    }
}

/// Append a step for `tool` unless its arguments cannot be derived
fn push_step(
    steps: &mut Vec<ExecutionStep>,
    tool: &ToolManifest,
    command: &str,
    metadata: Option<&Metadata>,
) -> Result<()> {
    let Some(args) = build_args(&tool.tool_id, command, metadata)? else {
        tracing::debug!(tool_id = %tool.tool_id, "Skipping tool, required arguments missing");
        return Ok(());
    };
    steps.push(ExecutionStep {
        step: steps.len() as u32 + 1,
        tool_id: tool.tool_id.clone(),
        args,
        description: describe_step(tool, command),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditLevel, MemoryAuditLog};
    use crate::bus::EventBus;
    use crate::error::AgentError;
    use crate::memory::{InMemorySessionMemory, MemoryRecord};
    use crate::registry::FnToolRegistry;
    use serde_json::json;
    use std::sync::Mutex;

    struct Fixture {
        bus: Arc<EventBus>,
        memory: Arc<InMemorySessionMemory>,
        audit: Arc<MemoryAuditLog>,
        registry: Arc<FnToolRegistry>,
        agent: PlannerAgent,
    }

    fn fixture(tools: &[(&str, &str)]) -> Fixture {
        let bus = Arc::new(EventBus::new());
        let memory = Arc::new(InMemorySessionMemory::default());
        let audit = Arc::new(MemoryAuditLog::default());
        let registry = Arc::new(FnToolRegistry::new());
        for (id, desc) in tools {
            registry
                .register(id, desc, |_| async move { Ok(serde_json::Value::Null) })
                .unwrap();
        }
        let agent = PlannerAgent::new(AgentDeps {
            bus: bus.clone(),
            session_memory: memory.clone(),
            audit_log: audit.clone(),
            tool_registry: registry.clone(),
        });
        Fixture {
            bus,
            memory,
            audit,
            registry,
            agent,
        }
    }

    fn capture_plans(bus: &EventBus) -> (Arc<Mutex<Vec<ExecutionPlan>>>, crate::bus::Unsubscribe) {
        let plans = Arc::new(Mutex::new(Vec::new()));
        let sink = plans.clone();
        let handle = bus.subscribe_typed::<ExecutionPlan, _>(PLAN_CREATED_TOPIC, move |plan| {
            sink.lock().unwrap().push(plan);
            Ok(())
        });
        (plans, handle)
    }

    fn meta(value: serde_json::Value) -> Metadata {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_steps_are_contiguous_from_one() {
        let f = fixture(&[
            ("sync_get_status", "Get sync status"),
            ("sync_queue_push", "Queue a push"),
            ("sync_queue_pull", "Queue a pull"),
            ("filesystem_find_file", "Find files"),
        ]);
        // push is skipped (no path), so numbering must close the gap
        let plan = f.agent.planner().build_plan("sync, upload and download my notes", None).unwrap();

        let numbers: Vec<u32> = plan.steps.iter().map(|s| s.step).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        let ids: Vec<&str> = plan.steps.iter().map(|s| s.tool_id.as_str()).collect();
        assert_eq!(ids, vec!["sync_get_status", "sync_queue_pull", "filesystem_find_file"]);
    }

    #[test]
    fn test_description_falls_back_to_synthesized_text() {
        let f = fixture(&[("weather_lookup", "")]);
        let plan = f.agent.planner().build_plan("is it raining", None).unwrap();
        assert_eq!(plan.steps[0].description, "Run weather_lookup for command \"is it raining\"");
    }

    #[test]
    fn test_manifest_read_per_command() {
        let f = fixture(&[("weather_lookup", "Weather")]);
        let first = f.agent.planner().build_plan("sync", None).unwrap();
        assert_eq!(first.steps[0].tool_id, "weather_lookup");

        f.registry
            .register("sync_get_status", "Sync", |_| async move { Ok(serde_json::Value::Null) })
            .unwrap();
        let second = f.agent.planner().build_plan("sync", None).unwrap();
        assert_eq!(second.steps[0].tool_id, "sync_get_status");
    }

    #[test]
    fn test_skipped_selection_falls_back_to_first_tool() {
        let f = fixture(&[
            ("weather_lookup", "Weather"),
            ("filesystem_write_file", "Write a file"),
        ]);
        let plan = f.agent.planner().build_plan("write a file", None).unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].step, 1);
        assert_eq!(plan.steps[0].tool_id, "weather_lookup");

        // first tool already tried and skipped: no second attempt
        let f = fixture(&[("filesystem_write_file", "Write a file")]);
        let plan = f.agent.planner().build_plan("write a file", None).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_empty_manifest_yields_empty_plan() {
        let f = fixture(&[]);
        let plan = f.agent.planner().build_plan("write a file", None).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.user_command, "write a file");
    }

    #[test]
    fn test_user_command_event_publishes_plan() {
        let f = fixture(&[("clickup_create_task", "Create a ClickUp task")]);
        let (plans, _h) = capture_plans(&f.bus);
        f.agent.initialize().unwrap();

        let report = f
            .bus
            .publish(USER_COMMAND_TOPIC, &UserCommandPayload::new("add a todo"))
            .unwrap();
        assert_eq!(report.delivered, 1);

        let plans = plans.lock().unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].steps[0].tool_id, "clickup_create_task");
        assert_eq!(plans[0].steps[0].description, "Create a ClickUp task");

        assert_eq!(f.memory.commands(), vec!["add a todo"]);
        assert_eq!(f.memory.plans()[0].plan_id, plans[0].plan_id);

        let infos: Vec<String> = f
            .audit
            .by_level(AuditLevel::Info)
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(infos, vec!["Received user command", "Generated execution plan"]);
    }

    #[test]
    fn test_planning_failure_records_command_but_publishes_nothing() {
        let f = fixture(&[("weather_lookup", "Weather")]);
        let (plans, _h) = capture_plans(&f.bus);
        f.agent.initialize().unwrap();

        let payload = UserCommandPayload::new("weather please")
            .with_metadata(meta(json!({"weather_lookup": "Paris"})));
        let report = f.bus.publish(USER_COMMAND_TOPIC, &payload).unwrap();
        assert_eq!(report.failed, 1);

        assert!(plans.lock().unwrap().is_empty());
        assert_eq!(f.memory.commands(), vec!["weather please"]);
        assert!(f.memory.plans().is_empty());

        let errors = f.audit.by_level(AuditLevel::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Failed to build execution plan");

        let direct = f.agent.planner().handle_command(&payload).unwrap_err();
        assert!(matches!(direct, AgentError::InvalidArguments { .. }));
    }

    #[test]
    fn test_zero_step_plan_still_recorded_and_published() {
        let f = fixture(&[]);
        let (plans, _h) = capture_plans(&f.bus);
        f.agent.initialize().unwrap();

        f.bus
            .publish(USER_COMMAND_TOPIC, &UserCommandPayload::new("anything"))
            .unwrap();

        assert_eq!(plans.lock().unwrap().len(), 1);
        assert!(plans.lock().unwrap()[0].steps.is_empty());
        assert!(matches!(
            f.memory.entries()[1].record,
            MemoryRecord::Plan { .. }
        ));
    }

    #[test]
    fn test_double_initialize_is_rejected() {
        let f = fixture(&[("sync_get_status", "Sync")]);
        f.agent.initialize().unwrap();
        assert!(matches!(f.agent.initialize(), Err(AgentError::AlreadyActive(_))));
        assert_eq!(f.bus.subscriber_count(USER_COMMAND_TOPIC), 1);
    }

    #[test]
    fn test_dispose_stops_planning() {
        let f = fixture(&[("sync_get_status", "Sync")]);
        let (plans, _h) = capture_plans(&f.bus);
        f.agent.dispose();
        f.agent.initialize().unwrap();
        f.agent.dispose();
        f.agent.dispose();
        assert_eq!(f.agent.state(), AgentState::Disposed);

        f.bus
            .publish(USER_COMMAND_TOPIC, &UserCommandPayload::new("sync"))
            .unwrap();
        assert!(plans.lock().unwrap().is_empty());
        assert!(f.memory.is_empty());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let f = fixture(&[]);
        f.agent.initialize().unwrap();
        let bus = f.bus.clone();
        drop(f);
        assert_eq!(bus.subscriber_count(USER_COMMAND_TOPIC), 0);
    }
}
