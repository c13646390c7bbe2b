//! Pipeline configuration
//!
//! All fields have defaults, so an empty JSON object is a valid config.
//! With the defaults the executor makes exactly one attempt per step and
//! does not serialize tool calls across plans.

use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration for the agent coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// Capacity of the default in-memory session memory (0 = unbounded)
    pub memory_capacity: usize,

    pub executor: ExecutorConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            memory_capacity: 10_000,
            executor: ExecutorConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load and validate a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: AgentConfig = serde_json::from_str(&json).map_err(|e| {
            AgentError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.executor.retry.validate()
    }
}

/// Executor behavior
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutorConfig {
    pub retry: RetryPolicy,

    /// Run at most one tool call at a time across all in-flight plans
    pub serialize_tool_calls: bool,
}

/// Bounded exponential backoff around a single tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Total attempts per step, including the first (1 = no retry)
    pub max_attempts: u32,

    pub initial_backoff_ms: u64,

    pub backoff_multiplier: f64,

    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 100,
            backoff_multiplier: 2.0,
            max_backoff_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self::default()
    }

    /// Retry up to `max_attempts` total attempts with the default backoff
    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    pub fn with_backoff(mut self, initial_ms: u64, multiplier: f64, max_ms: u64) -> Self {
        self.initial_backoff_ms = initial_ms;
        self.backoff_multiplier = multiplier;
        self.max_backoff_ms = max_ms;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(AgentError::Config(
                "retry.maxAttempts must be at least 1".to_string(),
            ));
        }
        if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 {
            return Err(AgentError::Config(format!(
                "retry.backoffMultiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }

    /// Delay before retry number `retry` (1-based), capped at `max_backoff_ms`
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(32) as i32;
        let ms = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exp);
        Duration::from_millis(ms.min(self.max_backoff_ms as f64) as u64)
    }
}
