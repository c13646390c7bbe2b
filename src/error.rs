//! Error types for a3s-agent

use thiserror::Error;

/// Errors that can occur in the agent pipeline
#[derive(Debug, Error)]
pub enum AgentError {
    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A bus handler reported a failure
    #[error("Handler for topic '{topic}' failed: {reason}")]
    Handler {
        topic: String,
        reason: String,
    },

    /// `initialize()` called on an agent that is already subscribed
    #[error("Agent '{0}' is already active")]
    AlreadyActive(String),

    /// Tool execution failure reported by the registry or the tool itself
    #[error("{message}")]
    Tool {
        tool_id: String,
        message: String,
    },

    /// Tool id not known to the registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Planner could not derive arguments of the expected shape
    #[error("Invalid arguments for tool '{tool_id}': {reason}")]
    InvalidArguments {
        tool_id: String,
        reason: String,
    },

    /// No async runtime available to drive background work
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal lock was poisoned by a panicking thread
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

impl AgentError {
    /// Build a tool failure for `tool_id`
    pub fn tool(tool_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool_id: tool_id.into(),
            message: message.into(),
        }
    }

    /// Build a handler failure, used by subscribers to signal errors to the bus
    pub fn handler(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Handler {
            topic: topic.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;
