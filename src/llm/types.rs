//! Message/role/options types for the LLM transport (§4.7).
//!
//! Trimmed from the teacher's chat-completion types: no `ToolDefinition`/
//! `tool_choice`/streaming-delta types, since the model only ever produces
//! and consumes plain text here (§10.2) — `tools` never travel through a
//! request body, only through the system prompt's catalog text.

use serde::{Deserialize, Serialize};

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// True when this is a tool-result message carrying the marker the
    /// context manager's truncation policy looks for (§4.6). Tool feedback
    /// travels back to the model as a user message (§10.2), so the marker
    /// prefix is the only signal left to distinguish it.
    pub fn is_tool_result(&self) -> bool {
        self.content.starts_with("[tool_result]")
    }
}

/// Sampling/length knobs for one `generate` call.
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub stop: Option<Vec<String>>,
}

impl GenerationOptions {
    pub fn precise() -> Self {
        GenerationOptions {
            temperature: Some(0.0),
            ..Default::default()
        }
    }

    pub fn creative() -> Self {
        GenerationOptions {
            temperature: Some(0.8),
            top_p: Some(0.95),
            ..Default::default()
        }
    }

    pub fn balanced() -> Self {
        GenerationOptions {
            temperature: Some(0.5),
            ..Default::default()
        }
    }
}

/// Result of one `generate` call (§4.7 contract).
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub content: String,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marked_content_is_recognized_as_a_tool_result() {
        let msg = Message::user("[tool_result] result text");
        assert!(msg.is_tool_result());
    }

    #[test]
    fn non_tool_messages_are_not_tool_results() {
        let msg = Message::user("hello");
        assert!(!msg.is_tool_result());
    }
}
