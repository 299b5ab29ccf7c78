//! Delegation tools (§4.11): `call_subordinate` and `delegate_parallel`.
//!
//! Decoupled from `AgentLoop` itself via `SubAgentRunner` — the loop module
//! supplies the concrete runner when it registers these tools, so `tools/`
//! never depends on the loop that drives it (the registry stays the single,
//! opaque boundary described in §4.3).

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::Profile;
use crate::error::{Error, Result};

use super::traits::{Tool, ToolResult};

/// Runs one delegated turn to completion and returns its final answer text.
/// Implemented by the loop module so `tools/` has no upward dependency on it.
#[async_trait]
pub trait SubAgentRunner: Send + Sync {
    async fn run_subordinate(&self, profile: Profile, message: String, relay_id: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct CallSubordinateArgs {
    profile: String,
    message: String,
}

/// `call_subordinate(profile, message)`: spawns a fresh sub-agent, runs one
/// streaming turn, forwards its step events to the parent via the relay,
/// and returns its final text as this tool's result.
///
/// `relay_id` must be the delegating `AgentLoop`'s own `agent_id`: that is
/// the id under which `AgentLoop::run_streaming` registers its emitter with
/// the relay at stream start, so the child's events land in the right sink.
pub struct CallSubordinateTool {
    runner: Arc<dyn SubAgentRunner>,
    relay_id: String,
}

impl CallSubordinateTool {
    pub fn new(runner: Arc<dyn SubAgentRunner>, relay_id: String) -> Self {
        CallSubordinateTool { runner, relay_id }
    }
}

#[async_trait]
impl Tool for CallSubordinateTool {
    fn name(&self) -> &str {
        "call_subordinate"
    }

    fn description(&self) -> &str {
        "Delegate a sub-task to a fresh sub-agent and return its final answer"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "profile": {"type": "string", "enum": ["web", "coder", "general"]},
                "message": {"type": "string"}
            },
            "required": ["profile", "message"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let args: CallSubordinateArgs = serde_json::from_value(args)
            .map_err(|e| Error::InvalidInput(format!("invalid call_subordinate arguments: {e}")))?;
        let profile: Profile = args.profile.parse()?;

        match self
            .runner
            .run_subordinate(profile, args.message, &self.relay_id)
            .await
        {
            Ok(text) => Ok(ToolResult::success(text)),
            Err(e) => Ok(ToolResult::failure(e.to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DelegateTask {
    profile: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct DelegateParallelArgs {
    tasks: Vec<DelegateTask>,
}

/// `delegate_parallel(tasks)`: fans out `call_subordinate` across all tasks
/// concurrently and merges results back in input order. `relay_id` carries
/// the same meaning as `CallSubordinateTool`'s.
pub struct DelegateParallelTool {
    runner: Arc<dyn SubAgentRunner>,
    relay_id: String,
}

impl DelegateParallelTool {
    pub fn new(runner: Arc<dyn SubAgentRunner>, relay_id: String) -> Self {
        DelegateParallelTool { runner, relay_id }
    }
}

#[async_trait]
impl Tool for DelegateParallelTool {
    fn name(&self) -> &str {
        "delegate_parallel"
    }

    fn description(&self) -> &str {
        "Delegate multiple sub-tasks concurrently and collect their final answers in order"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "tasks": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "profile": {"type": "string"},
                            "message": {"type": "string"}
                        },
                        "required": ["profile", "message"]
                    }
                }
            },
            "required": ["tasks"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        let args: DelegateParallelArgs = serde_json::from_value(args)
            .map_err(|e| Error::InvalidInput(format!("invalid delegate_parallel arguments: {e}")))?;

        let futures = args.tasks.into_iter().map(|task| {
            let runner = self.runner.clone();
            let relay_id = self.relay_id.clone();
            async move {
                let profile: Profile = task.profile.parse()?;
                runner.run_subordinate(profile, task.message, &relay_id).await
            }
        });

        let results = join_all(futures).await;
        let mut merged = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(text) => merged.push(text),
                Err(e) => merged.push(format!("[delegated task failed: {e}]")),
            }
        }

        Ok(ToolResult::success(merged.join("\n---\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoRunner {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SubAgentRunner for EchoRunner {
        async fn run_subordinate(&self, profile: Profile, message: String, _relay_id: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("[{profile}] {message}"))
        }
    }

    #[tokio::test]
    async fn call_subordinate_returns_runner_output() {
        let runner = Arc::new(EchoRunner {
            calls: AtomicUsize::new(0),
        });
        let tool = CallSubordinateTool::new(runner.clone(), "relay-1".to_string());
        let result = tool
            .execute(json!({"profile": "coder", "message": "refactor this"}))
            .await
            .unwrap();
        assert_eq!(result.content.as_deref(), Some("[coder] refactor this"));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delegate_parallel_preserves_input_order() {
        let runner = Arc::new(EchoRunner {
            calls: AtomicUsize::new(0),
        });
        let tool = DelegateParallelTool::new(runner, "relay-1".to_string());
        let result = tool
            .execute(json!({"tasks": [
                {"profile": "web", "message": "first"},
                {"profile": "general", "message": "second"}
            ]}))
            .await
            .unwrap();
        let content = result.content.unwrap();
        let first_pos = content.find("first").unwrap();
        let second_pos = content.find("second").unwrap();
        assert!(first_pos < second_pos);
    }

    #[tokio::test]
    async fn unknown_profile_is_rejected() {
        let runner = Arc::new(EchoRunner {
            calls: AtomicUsize::new(0),
        });
        let tool = CallSubordinateTool::new(runner, "relay-1".to_string());
        let result = tool.execute(json!({"profile": "bogus", "message": "x"})).await;
        assert!(result.is_err());
    }
}
