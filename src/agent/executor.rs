//! Executor agent — runs a plan step by step against the tool registry
//!
//! Steps run strictly in order; step N+1 does not start until step N's
//! outcome has been recorded and published. The first failing step ends
//! the run: its error is published and later steps are never attempted.

use super::{Agent, AgentDeps, AgentState, Lifecycle};
use crate::bus::panic_message;
use crate::config::{ExecutorConfig, RetryPolicy};
use crate::error::{AgentError, Result};
use crate::events::{ExecutionResultPayload, EXECUTION_RESULT_TOPIC, PLAN_CREATED_TOPIC};
use crate::registry::{SerializedToolRegistry, ToolRegistry};
use crate::types::{ExecutionPlan, ExecutionStep};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

/// Outcome of one plan run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub plan_id: String,
    /// Steps that succeeded
    pub completed: usize,
    /// Step number that failed and stopped the run
    pub failed_step: Option<u32>,
}

impl ExecutionSummary {
    pub fn succeeded(&self) -> bool {
        self.failed_step.is_none()
    }
}

/// Subscribes to `plan-created` and publishes `execution-result`
pub struct ExecutorAgent {
    inner: Arc<Executor>,
    lifecycle: Lifecycle,
}

/// Execution logic, independent of the bus subscription
pub struct Executor {
    deps: AgentDeps,
    retry: RetryPolicy,
}

impl ExecutorAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self::with_config(deps, ExecutorConfig::default())
    }

    pub fn with_config(mut deps: AgentDeps, config: ExecutorConfig) -> Self {
        if config.serialize_tool_calls {
            let serialized: Arc<dyn ToolRegistry> =
                Arc::new(SerializedToolRegistry::new(deps.tool_registry.clone()));
            deps.tool_registry = serialized;
        }
        Self {
            inner: Arc::new(Executor {
                deps,
                retry: config.retry,
            }),
            lifecycle: Lifecycle::new("executor"),
        }
    }

    /// Execution logic, for direct use without the bus
    pub fn executor(&self) -> &Executor {
        &self.inner
    }
}

impl Agent for ExecutorAgent {
    fn name(&self) -> &str {
        self.lifecycle.name()
    }

    fn initialize(&self) -> Result<()> {
        let bus = self.inner.deps.bus.clone();
        let executor: Weak<Executor> = Arc::downgrade(&self.inner);
        self.lifecycle.activate(|| {
            bus.subscribe_typed::<ExecutionPlan, _>(PLAN_CREATED_TOPIC, move |plan| {
                let Some(executor) = executor.upgrade() else {
                    return Ok(());
                };
                // Run off the bus so publishers are never blocked by tool calls
                let runtime = tokio::runtime::Handle::try_current()
                    .map_err(|e| AgentError::Runtime(e.to_string()))?;
                runtime.spawn(async move {
                    executor.execute_plan(&plan).await;
                });
                Ok(())
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

impl Drop for ExecutorAgent {
    fn drop(&mut self) {
        self.lifecycle.deactivate();
    }
}

impl Executor {
    /// Run every step of `plan` in order, stopping at the first failure
    pub async fn execute_plan(&self, plan: &ExecutionPlan) -> ExecutionSummary {
        let mut summary = ExecutionSummary {
            plan_id: plan.plan_id.clone(),
            completed: 0,
            failed_step: None,
        };

        for step in &plan.steps {
            if !self.execute_step(&plan.plan_id, step).await {
                summary.failed_step = Some(step.step);
                break;
            }
            summary.completed += 1;
        }

        tracing::info!(
            plan_id = %plan.plan_id,
            steps = plan.steps.len(),
            completed = summary.completed,
            failed_step = ?summary.failed_step,
            "Plan execution finished"
        );
        summary
    }

    /// Execute one step; returns whether the plan should continue
    pub async fn execute_step(&self, plan_id: &str, step: &ExecutionStep) -> bool {
        let deps = &self.deps;
        deps.audit_log.info(
            "Executing plan step",
            Some(serde_json::json!({
                "planId": plan_id,
                "step": step.step,
                "toolId": step.tool_id,
            })),
        );

        match self.call_tool(plan_id, step).await {
            Ok(result) => {
                deps.session_memory
                    .record_execution_result(plan_id, step, Some(&result), None);
                self.publish(ExecutionResultPayload::success(plan_id, step.clone(), result));
                true
            }
            Err(e) => {
                let message = e.to_string();
                deps.audit_log.error(
                    "Plan step failed",
                    Some(serde_json::json!({
                        "planId": plan_id,
                        "step": step.step,
                        "toolId": step.tool_id,
                        "error": message,
                    })),
                );
                deps.session_memory
                    .record_execution_result(plan_id, step, None, Some(&message));
                self.publish(ExecutionResultPayload::failure(plan_id, step.clone(), message));
                false
            }
        }
    }

    /// Registry call wrapped in the configured retry policy
    async fn call_tool(&self, plan_id: &str, step: &ExecutionStep) -> Result<serde_json::Value> {
        let registry = &self.deps.tool_registry;
        let mut attempt = 1;
        loop {
            // A panicking tool fails its step like any other tool error
            let outcome = match AssertUnwindSafe(registry.execute(&step.tool_id, &step.args))
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(panic) => Err(AgentError::tool(
                    &step.tool_id,
                    format!("Tool panicked: {}", panic_message(panic.as_ref())),
                )),
            };
            match outcome {
                Ok(result) => return Ok(result),
                Err(e) if attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!(
                        plan_id = %plan_id,
                        step = step.step,
                        tool_id = %step.tool_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Tool call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn publish(&self, payload: ExecutionResultPayload) {
        if let Err(e) = self.deps.bus.publish(EXECUTION_RESULT_TOPIC, &payload) {
            tracing::warn!(
                plan_id = %payload.plan_id,
                step = payload.step.step,
                error = %e,
                "Failed to publish execution result"
            );
        }
    }
}
