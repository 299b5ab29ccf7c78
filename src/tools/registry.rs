//! Tool registry — the single boundary between the core and all
//! side-effectful tools (§4.3). Tool implementations are opaque to the core:
//! the loop only ever sees `register`/`execute`.

use std::collections::HashMap;

use crate::error::Result;

use super::traits::{Tool, ToolCall, ToolResult};

pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry {
            tools: HashMap::new(),
        }
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Render every registered tool's catalog entry, in name order, for
    /// inclusion in the system prompt's tool catalog section.
    pub fn tool_catalog(&self) -> String {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
            .into_iter()
            .filter_map(|n| self.tools.get(n))
            .map(|t| t.prompt_spec())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        match self.get(&call.name) {
            Some(tool) => tool.execute(call.arguments.clone()).await,
            None => Ok(ToolResult::failure(format!("Unknown tool: {}", call.name))),
        }
    }

    pub fn count(&self) -> usize {
        self.tools.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes its input back"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }
        async fn execute(&self, args: Value) -> Result<ToolResult> {
            Ok(ToolResult::success(args["text"].as_str().unwrap_or("")))
        }
    }

    #[tokio::test]
    async fn register_and_execute_round_trip() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);

        let call = ToolCall {
            id: "1".to_string(),
            name: "echo".to_string(),
            arguments: json!({"text": "hi"}),
        };
        let result = registry.execute(&call).await.unwrap();
        assert_eq!(result.content.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn unknown_tool_is_a_failure_result_not_an_error() {
        let registry = ToolRegistry::new();
        let call = ToolCall {
            id: "1".to_string(),
            name: "nonexistent".to_string(),
            arguments: json!({}),
        };
        let result = registry.execute(&call).await.unwrap();
        assert!(!result.success);
    }

    #[test]
    fn tool_catalog_includes_registered_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        assert!(registry.tool_catalog().contains("echo"));
    }
}
