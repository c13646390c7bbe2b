//! Tool registry — the executable capabilities plans refer to
//!
//! The pipeline only needs two things from a registry: a manifest to plan
//! against and a way to run a tool by id. What a tool does (HTTP calls,
//! file I/O, ...) is the registry's business.

use crate::error::{AgentError, Result};
use crate::types::{Args, ToolManifest};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

/// Core trait for tool registries
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// Tools currently available, in declaration order
    fn manifest(&self) -> Vec<ToolManifest>;

    /// Run `tool_id` with `args`
    ///
    /// Errors are tool-level failures; the executor turns them into
    /// error events.
    async fn execute(&self, tool_id: &str, args: &Args) -> Result<serde_json::Value>;
}

#[async_trait]
impl<R: ToolRegistry + ?Sized> ToolRegistry for Arc<R> {
    fn manifest(&self) -> Vec<ToolManifest> {
        (**self).manifest()
    }

    async fn execute(&self, tool_id: &str, args: &Args) -> Result<serde_json::Value> {
        (**self).execute(tool_id, args).await
    }
}

/// Boxed async tool body
pub type ToolFn = Arc<dyn Fn(Args) -> BoxFuture<'static, Result<serde_json::Value>> + Send + Sync>;

struct RegisteredTool {
    manifest: ToolManifest,
    run: ToolFn,
}

/// Registry of named async closures
///
/// The manifest lists tools in registration order. Registering an id
/// twice replaces the earlier tool but keeps its position.
#[derive(Default)]
pub struct FnToolRegistry {
    tools: RwLock<Vec<RegisteredTool>>,
}

impl FnToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool body under `tool_id`
    pub fn register<F, Fut>(&self, tool_id: &str, description: &str, run: F) -> Result<()>
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        let tool = RegisteredTool {
            manifest: ToolManifest::new(tool_id, description),
            run: Arc::new(move |args: Args| run(args).boxed()),
        };

        let mut tools = self
            .tools
            .write()
            .map_err(|e| AgentError::Lock(e.to_string()))?;
        match tools.iter_mut().find(|t| t.manifest.tool_id == tool_id) {
            Some(existing) => *existing = tool,
            None => tools.push(tool),
        }

        tracing::debug!(tool_id = %tool_id, "Tool registered");
        Ok(())
    }

    /// Builder-style registration
    pub fn with_tool<F, Fut>(self, tool_id: &str, description: &str, run: F) -> Result<Self>
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        self.register(tool_id, description, run)?;
        Ok(self)
    }

    /// Remove a tool; returns true if it existed
    pub fn unregister(&self, tool_id: &str) -> Result<bool> {
        let mut tools = self
            .tools
            .write()
            .map_err(|e| AgentError::Lock(e.to_string()))?;
        let before = tools.len();
        tools.retain(|t| t.manifest.tool_id != tool_id);
        Ok(tools.len() != before)
    }

    fn lookup(&self, tool_id: &str) -> Result<ToolFn> {
        let tools = self
            .tools
            .read()
            .map_err(|e| AgentError::Lock(e.to_string()))?;
        tools
            .iter()
            .find(|t| t.manifest.tool_id == tool_id)
            .map(|t| t.run.clone())
            .ok_or_else(|| AgentError::ToolNotFound(tool_id.to_string()))
    }
}

#[async_trait]
impl ToolRegistry for FnToolRegistry {
    fn manifest(&self) -> Vec<ToolManifest> {
        match self.tools.read() {
            Ok(tools) => tools.iter().map(|t| t.manifest.clone()).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Tool list lock poisoned, reporting empty manifest");
                Vec::new()
            }
        }
    }

    async fn execute(&self, tool_id: &str, args: &Args) -> Result<serde_json::Value> {
        // Clone the body out so the lock is not held across the await
        let run = self.lookup(tool_id)?;
        run(args.clone()).await
    }
}

/// Serializes tool calls through a single async mutex
///
/// Use when the wrapped registry is not safe for concurrent use: plans
/// still interleave step by step, but no two tool calls overlap.
pub struct SerializedToolRegistry<R> {
    inner: R,
    gate: Mutex<()>,
}

impl<R: ToolRegistry> SerializedToolRegistry<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            gate: Mutex::new(()),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

#[async_trait]
impl<R: ToolRegistry> ToolRegistry for SerializedToolRegistry<R> {
    fn manifest(&self) -> Vec<ToolManifest> {
        self.inner.manifest()
    }

    async fn execute(&self, tool_id: &str, args: &Args) -> Result<serde_json::Value> {
        let _guard = self.gate.lock().await;
        self.inner.execute(tool_id, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn echo_registry() -> FnToolRegistry {
        FnToolRegistry::new()
            .with_tool("echo", "Echo the arguments", |args| async move {
                Ok(serde_json::Value::Object(args))
            })
            .unwrap()
            .with_tool("fail", "Always fails", |_| async move {
                Err(AgentError::tool("fail", "tool exploded"))
            })
            .unwrap()
    }

    #[test]
    fn test_manifest_in_registration_order() {
        let registry = echo_registry();
        let ids: Vec<String> = registry.manifest().into_iter().map(|t| t.tool_id).collect();
        assert_eq!(ids, vec!["echo", "fail"]);
    }

    #[test]
    fn test_reregister_keeps_position() {
        let registry = echo_registry();
        registry
            .register("echo", "Echo v2", |_| async move { Ok(serde_json::json!("v2")) })
            .unwrap();

        let manifest = registry.manifest();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest[0].description, "Echo v2");
    }

    #[test]
    fn test_unregister() {
        let registry = echo_registry();
        assert!(registry.unregister("fail").unwrap());
        assert!(!registry.unregister("fail").unwrap());
        assert_eq!(registry.manifest().len(), 1);
    }

    #[tokio::test]
    async fn test_execute_echo() {
        let registry = echo_registry();
        let mut args = Args::new();
        args.insert("x".to_string(), serde_json::json!(1));

        let result = registry.execute("echo", &args).await.unwrap();
        assert_eq!(result, serde_json::json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_execute_failure_and_unknown_tool() {
        let registry = echo_registry();

        let err = registry.execute("fail", &Args::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "tool exploded");

        let err = registry.execute("missing", &Args::new()).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolNotFound(ref id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_serialized_registry_never_overlaps() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let registry = {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            FnToolRegistry::new()
                .with_tool("slow", "Slow tool", move |_| {
                    let in_flight = in_flight.clone();
                    let peak = peak.clone();
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok(serde_json::Value::Null)
                    }
                })
                .unwrap()
        };
        let registry = Arc::new(SerializedToolRegistry::new(registry));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.execute("slow", &Args::new()).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(registry.manifest().len(), 1);
    }
}
