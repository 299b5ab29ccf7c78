//! Context manager (§4.6): enforces token-budget invariants on a mutable
//! message list.
//!
//! Token estimation follows the teacher's `agent::conversation`
//! `truncate_to_tokens` (~4 chars/token); the truncate/highlight/hard-prune
//! three-step compression policy is new structure modeled on
//! `compact.rs`'s smart, content-aware truncation and highlight extraction
//! from the broader pack.

use tracing::info;

use crate::error::Result;
use crate::llm::types::{Message, Role};
use crate::memory::ArchivalStore;

/// Approximate characters per token used for estimation (§4.6).
const CHARS_PER_TOKEN: usize = 4;

/// Label archival entries saved from pruned conversation highlights.
const HIGHLIGHTS_LABEL: &str = "conversation_highlights";

/// Truncate-old-tool-results parameters.
const TOOL_RESULTS_KEEP_INTACT: usize = 10;
const TOOL_RESULT_TRUNCATE_CHARS: usize = 500;

/// Save-highlights parameters.
const MAX_HIGHLIGHTS: usize = 3;
const HIGHLIGHT_MIN_CHARS: usize = 50;
const HIGHLIGHT_CHARS: usize = 300;

/// Default cap on the tail message count after hard pruning.
const DEFAULT_MAX_CONTEXT_MESSAGES: usize = 200;

/// Token-budget policy knobs (§6).
#[derive(Debug, Clone, Copy)]
pub struct ContextPolicy {
    pub window_size: u32,
    pub response_reserve_pct: f32,
    pub compression_threshold: f32,
    pub auto_compress: bool,
    pub max_context_messages: usize,
}

impl Default for ContextPolicy {
    fn default() -> Self {
        ContextPolicy {
            window_size: 32768,
            response_reserve_pct: 0.1,
            compression_threshold: 0.8,
            auto_compress: true,
            max_context_messages: DEFAULT_MAX_CONTEXT_MESSAGES,
        }
    }
}

impl ContextPolicy {
    /// Effective token budget `L = window_size - response_reserve`.
    pub fn effective_limit(&self) -> u32 {
        let reserve = (self.window_size as f32 * self.response_reserve_pct) as u32;
        self.window_size.saturating_sub(reserve)
    }

    fn compression_trigger(&self) -> u32 {
        (self.effective_limit() as f32 * self.compression_threshold) as u32
    }
}

/// Enforces context-window budget on a conversation's message list.
pub struct ContextManager {
    policy: ContextPolicy,
    last_prompt_tokens: Option<u32>,
}

impl ContextManager {
    pub fn new(policy: ContextPolicy) -> Self {
        ContextManager {
            policy,
            last_prompt_tokens: None,
        }
    }

    /// Approximate token count over the concatenated messages.
    pub fn estimate_tokens(&mut self, messages: &[Message]) -> u32 {
        let chars: usize = messages.iter().map(|m| m.content.len()).sum();
        let estimate = (chars / CHARS_PER_TOKEN) as u32;
        self.last_prompt_tokens.get_or_insert(estimate);
        self.last_prompt_tokens = Some(estimate);
        estimate
    }

    pub fn last_prompt_tokens(&self) -> Option<u32> {
        self.last_prompt_tokens
    }

    fn should_compress(&self, estimated_tokens: u32) -> bool {
        self.policy.auto_compress && estimated_tokens > self.policy.compression_trigger()
    }

    /// Run the full compression policy if the estimated token count is over
    /// threshold. No-op (returns `false`) otherwise. Indices 0 (system
    /// prompt) and 1 (original user message) are always preserved.
    pub async fn maybe_compress(
        &mut self,
        messages: &mut Vec<Message>,
        archival: &ArchivalStore,
    ) -> Result<bool> {
        let estimated = self.estimate_tokens(messages);
        if !self.should_compress(estimated) {
            return Ok(false);
        }

        truncate_old_tool_results(messages);
        save_highlights(messages, archival).await?;
        hard_prune(messages, self.policy.max_context_messages);

        info!(
            "context compressed: {} tokens estimated over {} trigger, {} messages remain",
            estimated,
            self.policy.compression_trigger(),
            messages.len()
        );
        Ok(true)
    }
}

/// Among tool-result messages, keep the last `TOOL_RESULTS_KEEP_INTACT`
/// intact and truncate each older one to `TOOL_RESULT_TRUNCATE_CHARS` with
/// an elision marker.
fn truncate_old_tool_results(messages: &mut [Message]) {
    let tool_result_indices: Vec<usize> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_tool_result())
        .map(|(i, _)| i)
        .collect();

    let cutoff = tool_result_indices
        .len()
        .saturating_sub(TOOL_RESULTS_KEEP_INTACT);

    for &idx in &tool_result_indices[..cutoff] {
        let msg = &mut messages[idx];
        if msg.content.len() > TOOL_RESULT_TRUNCATE_CHARS {
            msg.content.truncate(TOOL_RESULT_TRUNCATE_CHARS);
            msg.content.push_str("\n[... elided: older tool result truncated ...]");
        }
    }
}

/// From assistant messages in the middle section about to be pruned, pick
/// up to three non-trivial answers and archive them under
/// `conversation_highlights`.
async fn save_highlights(messages: &[Message], archival: &ArchivalStore) -> Result<()> {
    let middle = middle_slice(messages);

    let highlights: Vec<String> = middle
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .filter(|m| m.content.len() >= HIGHLIGHT_MIN_CHARS)
        .filter(|m| !looks_like_raw_tool_call(&m.content))
        .take(MAX_HIGHLIGHTS)
        .map(|m| m.content.chars().take(HIGHLIGHT_CHARS).collect::<String>())
        .collect();

    if highlights.is_empty() {
        return Ok(());
    }

    archival
        .append(HIGHLIGHTS_LABEL, &highlights.join("\n---\n"))
        .await?;
    Ok(())
}

fn looks_like_raw_tool_call(content: &str) -> bool {
    let trimmed = content.trim_start();
    trimmed.starts_with('{') && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
}

/// The middle section of the message list: everything except index 0
/// (system prompt) and index 1 (original user message), which are always
/// preserved, and a small tail kept for continuity.
fn middle_slice(messages: &[Message]) -> &[Message] {
    let start = 2.min(messages.len());
    let end = messages.len();
    &messages[start..end]
}

/// Always preserve indices 0 and 1; remove the oldest middle entries so
/// the tail contains at most `max_context_messages` turns.
fn hard_prune(messages: &mut Vec<Message>, max_context_messages: usize) {
    let preserved_head = 2.min(messages.len());
    let total_cap = preserved_head + max_context_messages;
    if messages.len() <= total_cap {
        return;
    }

    let excess = messages.len() - total_cap;
    messages.drain(preserved_head..preserved_head + excess);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: Role, content: &str) -> Message {
        Message {
            role,
            content: content.to_string(),
        }
    }

    #[test]
    fn effective_limit_subtracts_response_reserve() {
        let policy = ContextPolicy {
            window_size: 1000,
            response_reserve_pct: 0.1,
            ..ContextPolicy::default()
        };
        assert_eq!(policy.effective_limit(), 900);
    }

    #[test]
    fn estimate_tokens_uses_four_chars_per_token() {
        let mut cm = ContextManager::new(ContextPolicy::default());
        let messages = vec![msg(Role::User, &"x".repeat(400))];
        assert_eq!(cm.estimate_tokens(&messages), 100);
    }

    #[test]
    fn truncate_old_tool_results_keeps_recent_ten_intact() {
        let mut messages: Vec<Message> = (0..15)
            .map(|i| msg(Role::User, &format!("[tool_result] result {i}: {}", "x".repeat(600))))
            .collect();
        truncate_old_tool_results(&mut messages);

        for m in &messages[..5] {
            assert!(m.content.contains("elided"));
        }
        for m in &messages[5..] {
            assert!(!m.content.contains("elided"));
        }
    }

    #[test]
    fn hard_prune_preserves_system_and_first_user_message() {
        let mut messages: Vec<Message> = vec![msg(Role::System, "sys"), msg(Role::User, "first")];
        messages.extend((0..250).map(|i| msg(Role::User, &format!("turn {i}"))));

        hard_prune(&mut messages, 200);

        assert_eq!(messages[0].content, "sys");
        assert_eq!(messages[1].content, "first");
        assert_eq!(messages.len(), 2 + 200);
        assert_eq!(messages.last().unwrap().content, "turn 249");
    }

    #[test]
    fn hard_prune_is_noop_under_cap() {
        let mut messages: Vec<Message> = vec![msg(Role::System, "sys"), msg(Role::User, "first")];
        let before = messages.len();
        hard_prune(&mut messages, 200);
        assert_eq!(messages.len(), before);
    }

    #[test]
    fn raw_json_tool_call_is_not_a_highlight_candidate() {
        assert!(looks_like_raw_tool_call(r#"{"tool_name": "shell"}"#));
        assert!(!looks_like_raw_tool_call("This is a real answer about Rust."));
    }
}
