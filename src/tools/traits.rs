//! Core tool trait and result/call types
//!
//! The LLM never sees these tools through a provider's native function-calling
//! schema — `parser::ToolCallParser` recovers calls from free text instead
//! (§10.2). `Tool::prompt_spec` is how a tool's name/description/schema reach
//! the model: rendered into the system prompt's tool catalog section rather
//! than sent as a structured API field.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// A tool that can be invoked by a dispatched call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, as referenced by `ParsedToolCall::name`.
    fn name(&self) -> &str;

    /// One-line description shown in the tool catalog.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's arguments, used for both prompt rendering
    /// and (optionally) argument validation.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> Result<ToolResult>;

    /// Render this tool's catalog entry for the system prompt.
    fn prompt_spec(&self) -> String {
        format!(
            "- {}: {}\n  parameters: {}",
            self.name(),
            self.description(),
            self.parameters_schema()
        )
    }
}

/// Result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub content: Option<String>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        ToolResult {
            success: true,
            content: Some(content.into()),
            error: None,
            metadata: None,
        }
    }

    pub fn success_with_metadata(content: impl Into<String>, metadata: Value) -> Self {
        ToolResult {
            success: true,
            content: Some(content.into()),
            error: None,
            metadata: Some(metadata),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        ToolResult {
            success: false,
            content: None,
            error: Some(error.into()),
            metadata: None,
        }
    }

    /// Render for feeding back into the conversation as a tool-result message.
    pub fn to_string(&self) -> String {
        if self.success {
            self.content.clone().unwrap_or_default()
        } else {
            format!("Error: {}", self.error.clone().unwrap_or_default())
        }
    }
}

/// A dispatched tool call, after `ToolCallParser` has recovered it from raw
/// model output and arguments have been re-packed into JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    /// Parse arguments into a specific type.
    pub fn parse_arguments<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        serde_json::from_value(self.arguments.clone())
            .map_err(|e| crate::Error::InvalidInput(format!("Invalid tool arguments: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_result_to_string_reflects_success() {
        assert_eq!(ToolResult::success("ok").to_string(), "ok");
        assert_eq!(ToolResult::failure("boom").to_string(), "Error: boom");
    }
}
