//! Core plan types for the a3s-agent pipeline
//!
//! All types use camelCase JSON serialization for wire compatibility.

use serde::{Deserialize, Serialize};

/// Tool arguments: a free-form JSON object validated by the tool itself
pub type Args = serde_json::Map<String, serde_json::Value>;

/// Command metadata: optional structured hints accompanying a user command
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// An ordered list of tool invocations derived from one user command
///
/// Created once by the planner and never mutated after it is published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    /// Unique plan identifier (plan-<uuid>)
    pub plan_id: String,

    /// The free-text command that produced this plan
    pub user_command: String,

    /// Steps in execution order; `step` numbers are 1..=N
    pub steps: Vec<ExecutionStep>,
}

impl ExecutionPlan {
    /// Create a plan with a freshly generated id
    pub fn new(user_command: impl Into<String>, steps: Vec<ExecutionStep>) -> Self {
        Self {
            plan_id: format!("plan-{}", uuid::Uuid::new_v4()),
            user_command: user_command.into(),
            steps,
        }
    }

    /// True if the plan has no actionable steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// One tool invocation within a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    /// 1-based ordinal position within the plan
    pub step: u32,

    /// Registry identifier of the tool to run
    pub tool_id: String,

    /// Arguments passed to the tool unchanged
    #[serde(default)]
    pub args: Args,

    /// Human-readable explanation, for display and audit only
    pub description: String,
}

/// Read-only view of a tool exposed by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolManifest {
    /// Stable tool identifier
    pub tool_id: String,

    /// Human-readable description, used as the default step description
    #[serde(default)]
    pub description: String,
}

impl ToolManifest {
    pub fn new(tool_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_creation() {
        let plan = ExecutionPlan::new("sync my notes", vec![]);
        assert!(plan.plan_id.starts_with("plan-"));
        assert_eq!(plan.user_command, "sync my notes");
        assert!(plan.is_empty());
    }

    #[test]
    fn test_plan_ids_are_unique() {
        let a = ExecutionPlan::new("a", vec![]);
        let b = ExecutionPlan::new("a", vec![]);
        assert_ne!(a.plan_id, b.plan_id);
    }

    #[test]
    fn test_plan_serialization_uses_camel_case() {
        let mut args = Args::new();
        args.insert("path".to_string(), serde_json::json!("/notes/a.md"));
        let plan = ExecutionPlan::new(
            "read the note",
            vec![ExecutionStep {
                step: 1,
                tool_id: "filesystem_read_file".to_string(),
                args,
                description: "Read a file".to_string(),
            }],
        );

        let json = serde_json::to_string(&plan).unwrap();
        assert!(json.contains("\"planId\""));
        assert!(json.contains("\"userCommand\":\"read the note\""));
        assert!(json.contains("\"toolId\":\"filesystem_read_file\""));

        let parsed: ExecutionPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, plan);
    }

    #[test]
    fn test_manifest_description_defaults_to_empty() {
        let tool: ToolManifest = serde_json::from_str(r#"{"toolId":"sync_get_status"}"#).unwrap();
        assert_eq!(tool.tool_id, "sync_get_status");
        assert!(tool.description.is_empty());
    }
}
