//! Bus topics and their payload contracts
//!
//! | Topic              | Payload                  | Publisher   | Subscriber |
//! |--------------------|--------------------------|-------------|------------|
//! | `user-command`     | [`UserCommandPayload`]   | caller      | planner    |
//! | `plan-created`     | [`ExecutionPlan`]        | planner     | executor   |
//! | `execution-result` | [`ExecutionResultPayload`] | executor  | observers  |

use crate::types::{ExecutionPlan, ExecutionStep, Metadata};
use serde::{Deserialize, Deserializer, Serialize};

pub const USER_COMMAND_TOPIC: &str = "user-command";
pub const PLAN_CREATED_TOPIC: &str = "plan-created";
pub const EXECUTION_RESULT_TOPIC: &str = "execution-result";

/// A free-text command submitted by a UI or CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCommandPayload {
    pub command: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl UserCommandPayload {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

pub type PlanCreatedPayload = ExecutionPlan;

/// Outcome of one attempted step
///
/// Exactly one of `result` / `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResultPayload {
    pub plan_id: String,

    pub step: ExecutionStep,

    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResultPayload {
    pub fn success(plan_id: impl Into<String>, step: ExecutionStep, result: serde_json::Value) -> Self {
        Self {
            plan_id: plan_id.into(),
            step,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(plan_id: impl Into<String>, step: ExecutionStep, error: impl Into<String>) -> Self {
        Self {
            plan_id: plan_id.into(),
            step,
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Keep an explicit `null` as `Some(Value::Null)`; only a missing field is `None`
pub(crate) fn present_value<'de, D>(deserializer: D) -> std::result::Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}
