//! Audit log — structured record of notable actions and failures
//!
//! `TracingAuditLog` forwards to `tracing` and is the default sink.
//! `MemoryAuditLog` keeps entries around for display and tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Write contract consumed by the agents
pub trait AuditLog: Send + Sync {
    fn info(&self, message: &str, context: Option<serde_json::Value>);

    fn error(&self, message: &str, context: Option<serde_json::Value>);
}

/// Severity of an audit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Info,
    Error,
}

/// A single audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub level: AuditLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// Audit sink writing to `tracing` under the `a3s_agent::audit` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLog;

impl AuditLog for TracingAuditLog {
    fn info(&self, message: &str, context: Option<serde_json::Value>) {
        let context = context.unwrap_or(serde_json::Value::Null);
        tracing::info!(target: "a3s_agent::audit", %context, "{}", message);
    }

    fn error(&self, message: &str, context: Option<serde_json::Value>) {
        let context = context.unwrap_or(serde_json::Value::Null);
        tracing::error!(target: "a3s_agent::audit", %context, "{}", message);
    }
}

/// In-memory audit log with bounded capacity
pub struct MemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
    max_entries: usize,
}

impl MemoryAuditLog {
    /// Create a log keeping at most `max_entries` (0 = unbounded)
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            max_entries,
        }
    }

    fn push(&self, level: AuditLevel, message: &str, context: Option<serde_json::Value>) {
        let Ok(mut entries) = self.entries.write() else {
            tracing::warn!(message = %message, "Audit log lock poisoned, entry dropped");
            return;
        };
        entries.push(AuditEntry {
            level,
            message: message.to_string(),
            context,
            timestamp: Utc::now(),
        });
        if self.max_entries > 0 && entries.len() > self.max_entries {
            let drain_count = entries.len() - self.max_entries;
            entries.drain(..drain_count);
        }
    }

    /// All entries, oldest first
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().map(|e| e.clone()).unwrap_or_default()
    }

    /// Entries at `level`, oldest first
    pub fn by_level(&self, level: AuditLevel) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == level)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl AuditLog for MemoryAuditLog {
    fn info(&self, message: &str, context: Option<serde_json::Value>) {
        self.push(AuditLevel::Info, message, context);
    }

    fn error(&self, message: &str, context: Option<serde_json::Value>) {
        self.push(AuditLevel::Error, message, context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_audit_levels() {
        let log = MemoryAuditLog::default();
        log.info("Received user command", Some(serde_json::json!({"command": "sync"})));
        log.error("Plan step failed", None);

        assert_eq!(log.len(), 2);
        let errors = log.by_level(AuditLevel::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Plan step failed");
        assert!(errors[0].context.is_none());

        let infos = log.by_level(AuditLevel::Info);
        assert_eq!(infos[0].context.as_ref().unwrap()["command"], "sync");
    }

    #[test]
    fn test_memory_audit_capacity() {
        let log = MemoryAuditLog::new(2);
        log.info("a", None);
        log.info("b", None);
        log.info("c", None);

        let messages: Vec<String> = log.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["b", "c"]);
    }

    #[test]
    fn test_tracing_audit_does_not_panic_without_subscriber() {
        let log = TracingAuditLog;
        log.info("hello", Some(serde_json::json!({"k": 1})));
        log.error("bye", None);
    }

    #[test]
    fn test_entry_serialization() {
        let log = MemoryAuditLog::default();
        log.error("boom", Some(serde_json::json!({"step": 2})));

        let json = serde_json::to_value(&log.entries()[0]).unwrap();
        assert_eq!(json["level"], "error");
        assert_eq!(json["context"]["step"], 2);
    }
}
