//! Session memory — history of commands, plans, and step outcomes
//!
//! The agents only write to memory. Writes are fire-and-forget: an
//! implementation that fails to store an entry logs and moves on.

use crate::types::{ExecutionPlan, ExecutionStep, Metadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Write contract consumed by the planner and executor
pub trait SessionMemory: Send + Sync {
    /// Record a raw user command, before any planning happens
    fn record_command(&self, command: &str, metadata: Option<&Metadata>);

    /// Record a plan as produced by the planner
    fn record_plan(&self, plan: &ExecutionPlan);

    /// Record the outcome of one step; `error` is set on failure
    fn record_execution_result(
        &self,
        plan_id: &str,
        step: &ExecutionStep,
        result: Option<&serde_json::Value>,
        error: Option<&str>,
    );
}

/// One remembered item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum MemoryRecord {
    Command {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Metadata>,
    },
    Plan {
        plan: ExecutionPlan,
    },
    #[serde(rename_all = "camelCase")]
    ExecutionResult {
        plan_id: String,
        step: ExecutionStep,
        #[serde(
            default,
            deserialize_with = "crate::events::present_value",
            skip_serializing_if = "Option::is_none"
        )]
        result: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// A record with the time it was written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEntry {
    pub recorded_at: DateTime<Utc>,
    pub record: MemoryRecord,
}

/// In-memory session history with bounded capacity
///
/// Once `max_entries` is exceeded the oldest entries are drained.
/// A capacity of 0 means unbounded.
pub struct InMemorySessionMemory {
    entries: RwLock<Vec<MemoryEntry>>,
    max_entries: usize,
}

impl InMemorySessionMemory {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            max_entries,
        }
    }

    fn push(&self, record: MemoryRecord) {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Session memory lock poisoned, entry dropped");
                return;
            }
        };

        entries.push(MemoryEntry {
            recorded_at: Utc::now(),
            record,
        });

        if self.max_entries > 0 && entries.len() > self.max_entries {
            let drain_count = entries.len() - self.max_entries;
            entries.drain(..drain_count);
        }
    }

    /// All entries, oldest first
    pub fn entries(&self) -> Vec<MemoryEntry> {
        self.entries
            .read()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Recorded commands, oldest first
    pub fn commands(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e.record {
                MemoryRecord::Command { command, .. } => Some(command),
                _ => None,
            })
            .collect()
    }

    /// Recorded plans, oldest first
    pub fn plans(&self) -> Vec<ExecutionPlan> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e.record {
                MemoryRecord::Plan { plan } => Some(plan),
                _ => None,
            })
            .collect()
    }

    /// Step outcomes recorded for `plan_id`, in the order they were written
    pub fn results_for(&self, plan_id: &str) -> Vec<MemoryRecord> {
        self.entries()
            .into_iter()
            .map(|e| e.record)
            .filter(|r| matches!(r, MemoryRecord::ExecutionResult { plan_id: id, .. } if id == plan_id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemorySessionMemory {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl SessionMemory for InMemorySessionMemory {
    fn record_command(&self, command: &str, metadata: Option<&Metadata>) {
        self.push(MemoryRecord::Command {
            command: command.to_string(),
            metadata: metadata.cloned(),
        });
    }

    fn record_plan(&self, plan: &ExecutionPlan) {
        self.push(MemoryRecord::Plan { plan: plan.clone() });
    }

    fn record_execution_result(
        &self,
        plan_id: &str,
        step: &ExecutionStep,
        result: Option<&serde_json::Value>,
        error: Option<&str>,
    ) {
        self.push(MemoryRecord::ExecutionResult {
            plan_id: plan_id.to_string(),
            step: step.clone(),
            result: result.cloned(),
            error: error.map(str::to_string),
        });
    }
}
