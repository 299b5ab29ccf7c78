//! Top-level entry point: acquires a worker from the pool for the duration
//! of one call and releases it back, regardless of outcome (§4.9, §6).
//!
//! Grounded on the teacher's `Scheduler` in the way it wraps a handful of
//! already-built collaborators behind a small facade whose public methods
//! take `&self`/`&Arc<Self>` so one runtime can be shared across many
//! concurrent callers without any of them blocking on another's worker.

use std::sync::Arc;

use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::agent_loop::RunOutcome;
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::{Error, Result};
use crate::llm::Message;
use crate::pool::{Worker, WorkerFactory, WorkerPool};
use crate::stream::StepStream;
use crate::tools::ToolRegistry;

/// Relayed stream's own channel capacity; independent of any one worker's
/// `AgentLoopConfig::step_stream_buffer`.
const RELAY_BUFFER: usize = 64;

/// The external interface named in §6: `run_streaming`, `run`, `resume`,
/// `compress_context`, `inject_conversation_history`, each backed by an
/// acquire/release cycle against the pool so no two in-flight calls ever
/// share one worker's `AgentLoop`.
pub struct AgentRuntime {
    pool: WorkerPool,
}

impl AgentRuntime {
    pub fn new(pool: WorkerPool) -> Self {
        AgentRuntime { pool }
    }

    /// Run one turn to completion, streaming step events as they occur.
    /// The worker is acquired here and released the moment the run's
    /// producer side finishes, regardless of how slowly the caller drains
    /// the returned stream.
    pub async fn run_streaming(self: &Arc<Self>, user_message: String) -> StepStream {
        let worker = self.pool.acquire().await;
        let inner = worker.agent_loop.clone().run_streaming(user_message).await;
        self.relay_and_release(worker, inner)
    }

    /// Non-streaming aggregate form (§6 `run`).
    pub async fn run(&self, user_message: String) -> RunOutcome {
        let worker = self.pool.acquire().await;
        let outcome = worker.agent_loop.clone().run(user_message).await;
        self.pool.release(worker).await;
        outcome
    }

    /// Restore a paused run by checkpoint id and continue it for the
    /// remaining step budget (§6 `resume`, §8 scenario 6).
    pub async fn resume(self: &Arc<Self>, checkpoint_id: Uuid, checkpoint_store: &CheckpointStore) -> Result<StepStream> {
        let cp = checkpoint_store
            .load(checkpoint_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("checkpoint {checkpoint_id} not found")))?;
        self.resume_checkpoint(cp).await
    }

    /// Same as `resume`, for a caller that already holds the `Checkpoint`
    /// (e.g. from a prior `CheckpointStore::list` call).
    pub async fn resume_checkpoint(self: &Arc<Self>, cp: Checkpoint) -> Result<StepStream> {
        let worker = self.pool.acquire().await;
        let agent_loop = worker.agent_loop.clone();
        let inner = match agent_loop.resume(cp).await {
            Ok(stream) => stream,
            Err(e) => {
                self.pool.release(worker).await;
                return Err(e);
            }
        };
        Ok(self.relay_and_release(worker, inner))
    }

    /// Force a compression pass on a worker's persisted history (§6
    /// `compress_context`).
    pub async fn compress_context(&self) -> usize {
        let worker = self.pool.acquire().await;
        let remaining = worker.agent_loop.compress_context().await;
        self.pool.release(worker).await;
        remaining
    }

    /// Seed a worker's persisted history from an external transcript (§6
    /// `inject_conversation_history`).
    pub async fn inject_conversation_history(&self, history: Vec<Message>) {
        let worker = self.pool.acquire().await;
        worker.agent_loop.inject_conversation_history(history).await;
        self.pool.release(worker).await;
    }

    /// Change pool capacity (§4.9 `resize`).
    pub async fn resize(&self, new_capacity: usize, factory: &dyn WorkerFactory, tools: &Arc<ToolRegistry>) -> Result<()> {
        self.pool.resize(new_capacity, factory, tools).await
    }

    /// `(idle, active, capacity)` for diagnostics (§8 conservation property).
    pub async fn pool_snapshot(&self) -> (usize, usize, usize) {
        self.pool.snapshot().await
    }

    /// Tee `inner`'s events into a fresh stream the caller owns, and release
    /// `worker` back to the pool the instant `inner` closes (the run
    /// finished, errored, or hit the global timeout). The worker is never
    /// handed back mid-run, and is returned even if the caller drops the
    /// outer stream without draining it — the relay task still runs to
    /// completion against `inner`.
    fn relay_and_release(self: &Arc<Self>, worker: Worker, inner: StepStream) -> StepStream {
        let outer = StepStream::new(RELAY_BUFFER);
        let emitter = outer.emitter.clone();
        let this = self.clone();
        let mut inner_stream = inner.stream;

        tokio::spawn(async move {
            while let Some(event) = inner_stream.next().await {
                emitter.emit(event).await;
            }
            this.pool.release(worker).await;
        });

        outer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{StepEvent, StepKind};

    // `AgentRuntime` needs a live `WorkerPool` (database-backed stores), so
    // acquire/release/resume are exercised as database integration tests;
    // this covers the relay's forwarding behavior in isolation.
    #[tokio::test]
    async fn relay_forwards_events_until_inner_closes() {
        let inner = StepStream::new(4);
        let inner_emitter = inner.emitter.clone();
        let outer = StepStream::new(4);
        let outer_emitter = outer.emitter.clone();
        let mut inner_rx = inner.stream;

        tokio::spawn(async move {
            while let Some(event) = inner_rx.next().await {
                outer_emitter.emit(event).await;
            }
        });

        inner_emitter.emit(StepEvent::new(1, StepKind::Think, "a")).await;
        inner_emitter.emit(StepEvent::new(2, StepKind::FinalAnswer, "b")).await;
        drop(inner_emitter);

        let events = crate::stream::collect(outer.stream).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, StepKind::FinalAnswer);
    }
}
