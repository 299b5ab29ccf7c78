//! Step events and the sub-agent relay.
//!
//! `AgentLoop::run_streaming` returns a cold, single-consumer stream of
//! `StepEvent`s (§4.10). When a delegation tool spawns a nested loop, its
//! events are forwarded into the parent's stream through a process-wide
//! registry keyed by agent id, so a UI watching the parent sees sub-agent
//! progress live without knowing delegation happened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;

/// The kind of a streamed step event (§3 glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Think,
    ToolCall,
    ToolResult,
    FinalAnswer,
    Error,
    SubAgentSpawn,
    SubAgentResult,
    Checkpoint,
    ContextInfo,
}

/// One unit on the step stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEvent {
    pub step_number: u32,
    pub kind: StepKind,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl StepEvent {
    pub fn new(step_number: u32, kind: StepKind, content: impl Into<String>) -> Self {
        StepEvent {
            step_number,
            kind,
            content: content.into(),
            tool_name: None,
            tool_success: None,
            sub_agent: None,
            confidence: None,
            checkpoint_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>, success: bool) -> Self {
        self.tool_name = Some(tool_name.into());
        self.tool_success = Some(success);
        self
    }

    pub fn with_sub_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.sub_agent = Some(agent_id.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_checkpoint(mut self, checkpoint_id: impl Into<String>) -> Self {
        self.checkpoint_id = Some(checkpoint_id.into());
        self
    }
}

/// The producer side of a step stream: owned by the `AgentLoop` driving a
/// run, dropped (closing the stream) when the run finishes.
#[derive(Clone)]
pub struct StepEmitter {
    tx: mpsc::Sender<StepEvent>,
}

impl StepEmitter {
    /// Send an event; silently drops it if the consumer has gone away
    /// (step emission is best-effort and must never block the loop).
    pub async fn emit(&self, event: StepEvent) {
        let _ = self.tx.send(event).await;
    }
}

/// A fresh, unconsumed step stream paired with its emitter half.
pub struct StepStream {
    pub emitter: StepEmitter,
    pub stream: ReceiverStream<StepEvent>,
}

impl StepStream {
    /// Create a new single-consumer step stream with a bounded channel; a
    /// slow consumer applies backpressure to the loop's emit calls rather
    /// than letting memory grow unbounded.
    pub fn new(buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        StepStream {
            emitter: StepEmitter { tx },
            stream: ReceiverStream::new(rx),
        }
    }
}

/// Process-wide registry of live agent-id → event-forwarding sinks, used so
/// a nested `AgentLoop` spawned by a delegation tool can relay its step
/// events into its parent's stream (§4.10).
#[derive(Clone, Default)]
pub struct SubAgentRelay {
    sinks: Arc<Mutex<HashMap<String, StepEmitter>>>,
}

impl SubAgentRelay {
    pub fn new() -> Self {
        SubAgentRelay::default()
    }

    /// Register a parent's emitter under a known relay id (its own
    /// `agent_id`), so a child loop it later spawns can forward step events
    /// back into this stream. Called once at stream start (§4.10).
    pub async fn register(&self, relay_id: impl Into<String>, emitter: StepEmitter) {
        self.sinks.lock().await.insert(relay_id.into(), emitter);
    }

    /// Forward one event from a child loop to its parent's sink, if still
    /// registered. No-op once the parent stream has completed and
    /// deregistered.
    pub async fn forward(&self, relay_id: &str, event: StepEvent) {
        if let Some(emitter) = self.sinks.lock().await.get(relay_id).cloned() {
            emitter.emit(event).await;
        }
    }

    /// Deregister a relay id once its parent stream completes.
    pub async fn deregister(&self, relay_id: &str) {
        self.sinks.lock().await.remove(relay_id);
    }
}

/// Drain a `StepStream` into a `Vec`, for tests and non-streaming callers.
pub async fn collect<S: Stream<Item = StepEvent> + Unpin>(mut stream: S) -> Vec<StepEvent> {
    use tokio_stream::StreamExt;
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emitted_events_arrive_in_order() {
        let step_stream = StepStream::new(8);
        let emitter = step_stream.emitter.clone();
        emitter.emit(StepEvent::new(1, StepKind::Think, "a")).await;
        emitter
            .emit(StepEvent::new(2, StepKind::FinalAnswer, "b"))
            .await;
        drop(emitter);
        drop(step_stream.emitter);

        let events = collect(step_stream.stream).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].content, "a");
        assert_eq!(events[1].content, "b");
    }

    #[tokio::test]
    async fn relay_forwards_to_registered_parent() {
        let relay = SubAgentRelay::new();
        let parent_stream = StepStream::new(8);
        let relay_id = "parent-1";
        relay.register(relay_id, parent_stream.emitter.clone()).await;

        relay
            .forward(relay_id, StepEvent::new(1, StepKind::SubAgentResult, "done"))
            .await;
        relay.deregister(relay_id).await;
        drop(parent_stream.emitter);

        let events = collect(parent_stream.stream).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, StepKind::SubAgentResult);
    }

    #[tokio::test]
    async fn forward_after_deregister_is_a_silent_no_op() {
        let relay = SubAgentRelay::new();
        let parent_stream = StepStream::new(8);
        let relay_id = "parent-2";
        relay.register(relay_id, parent_stream.emitter.clone()).await;
        relay.deregister(relay_id).await;

        relay
            .forward(relay_id, StepEvent::new(1, StepKind::Error, "too late"))
            .await;
        drop(parent_stream.emitter);

        let events = collect(parent_stream.stream).await;
        assert!(events.is_empty());
    }
}
