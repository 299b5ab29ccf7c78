//! The ReAct state machine driving one session (§4.8).
//!
//! Grounded on the teacher's `agent::agentic_loop::run_agentic_loop` for the
//! overall call-tool-feed-back shape and `agent::loop_guard` for per-run
//! counter bookkeeping, generalized from a fixed iteration cap into the full
//! S0–S7 machine: system-prompt composition, embedded-call recovery,
//! rule-gated dispatch, checkpointing, and context compression all run on
//! the same per-step cadence.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_stream::StreamExt;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::checkpoint::{Checkpoint, CheckpointStatus, CheckpointStore};
use crate::config::Profile;
use crate::context::{ContextManager, ContextPolicy};
use crate::error::{Error, Result};
use crate::llm::{GenerationOptions, GenerationResult, LlmClient, Message};
use crate::memory::{ArchivalStore, CoreMemoryStore, TaggedMemoryStore};
use crate::parser::{ParsedToolCall, ToolCallParser};
use crate::rules::ToolRuleEngine;
use crate::settings::Settings;
use crate::stream::{StepEmitter, StepEvent, StepKind, StepStream, SubAgentRelay};
use crate::tools::{SubAgentRunner, ToolCall, ToolRegistry, ToolResult};

/// Tool name that always terminates a run; handled by the loop itself, not
/// routed through `ToolRuleEngine`'s `Terminal` rule (§4.2).
const RESPONSE_TOOL: &str = "response";

const DELEGATION_TOOLS: &[&str] = &["call_subordinate", "delegate_parallel"];

/// Keys tried in order when the model's `response` call uses a synonym for
/// the `text` argument (§4.8 S4).
const ANSWER_TEXT_KEYS: &[&str] = &["text", "content", "response", "message", "answer", "reply", "output"];

/// Timeouts, budgets, and cadences for one loop run (§4.8, §5, §6).
#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    pub llm_call_timeout: Duration,
    pub tool_timeout: Duration,
    pub delegation_timeout: Duration,
    pub global_timeout: Duration,
    pub max_llm_retries: u32,
    pub max_tool_result_chars: usize,
    pub max_pairs: usize,
    pub message_truncate_chars: usize,
    pub checkpoint_every_steps: u32,
    pub checkpoint_prune_every_steps: u32,
    pub checkpoint_keep: i64,
    pub inter_step_sleep: Duration,
    pub step_stream_buffer: usize,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        AgentLoopConfig {
            llm_call_timeout: Duration::from_secs(180),
            tool_timeout: Duration::from_secs(300),
            delegation_timeout: Duration::from_secs(900),
            global_timeout: Duration::from_secs(600),
            max_llm_retries: 3,
            max_tool_result_chars: 32_000,
            max_pairs: 250,
            message_truncate_chars: 4000,
            checkpoint_every_steps: 5,
            checkpoint_prune_every_steps: 10,
            checkpoint_keep: 50,
            inter_step_sleep: Duration::from_millis(150),
            step_stream_buffer: 64,
        }
    }
}

/// Outcome of one non-streaming `run` call (§6 `run`).
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub final_output: String,
    pub steps: Vec<StepEvent>,
    pub success: bool,
}

/// Snapshot persisted into a `Checkpoint`'s opaque payload and restored by
/// `resume` (§4.5, §6 `resume`).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CheckpointPayload {
    working_messages: Vec<Message>,
    memory_blocks: HashMap<String, String>,
    user_message: String,
}

/// Per-run mutable state, held behind a mutex so `AgentLoop` can be shared
/// (e.g. with a delegation runner) without requiring exclusive `&mut` access
/// from the single caller that actually drives it (§3 "exclusive ownership
/// by at most one caller at a time" is enforced by convention, not the type
/// system, the same way a single-owner worker is in the pool).
struct LoopState {
    /// Persisted across runs: index 0 is the system prompt, 1..N alternate
    /// user/assistant turns. Never holds intra-run tool messages.
    conversation_messages: Vec<Message>,
}

/// Drives one session's ReAct loop end to end, from a user message to a
/// final answer or an error, emitting a stream of step events (§4.8).
pub struct AgentLoop {
    agent_id: String,
    profile: Profile,
    llm_client: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    core_memory: CoreMemoryStore,
    archival: ArchivalStore,
    tagged: TaggedMemoryStore,
    checkpoint_store: CheckpointStore,
    settings: Arc<dyn Settings>,
    relay: SubAgentRelay,
    config: AgentLoopConfig,
    state: Mutex<LoopState>,
}

impl AgentLoop {
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        agent_id: impl Into<String>,
        profile: Profile,
        llm_client: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        core_memory: CoreMemoryStore,
        archival: ArchivalStore,
        tagged: TaggedMemoryStore,
        checkpoint_store: CheckpointStore,
        settings: Arc<dyn Settings>,
        relay: SubAgentRelay,
        config: AgentLoopConfig,
    ) -> Result<Self> {
        let agent_id = agent_id.into();
        for label in ["persona", "human", "scratchpad"] {
            core_memory.ensure_block(&agent_id, label, false).await?;
        }

        Ok(AgentLoop {
            state: Mutex::new(LoopState {
                conversation_messages: Vec::new(),
            }),
            agent_id,
            profile,
            llm_client,
            tools,
            core_memory,
            archival,
            tagged,
            checkpoint_store,
            settings,
            relay,
            config,
        })
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Seed the session from an external UI transcript (§6
    /// `inject_conversation_history`).
    pub async fn inject_conversation_history(&self, history: Vec<Message>) {
        let mut state = self.state.lock().await;
        state.conversation_messages = history;
        trim_history(&mut state.conversation_messages, self.config.max_pairs, self.config.message_truncate_chars);
    }

    /// The persisted history tail, for an external caller to export (§8
    /// round-trip law: `inject_conversation_history(h); export_history()`
    /// returns the tail of `h` up to `max_pairs * 2`).
    pub async fn export_history(&self) -> Vec<Message> {
        self.state.lock().await.conversation_messages.clone()
    }

    /// Force a compression pass over the persisted history and return the
    /// remaining message count (§6 `compress_context`). Idempotent: calling
    /// it twice in a row with nothing new appended returns the same count.
    pub async fn compress_context(&self) -> usize {
        let mut state = self.state.lock().await;
        let mut policy = default_context_policy(&self.settings);
        policy.max_context_messages = self.config.max_pairs * 2;
        let mut cm = ContextManager::new(policy);
        let _ = cm
            .maybe_compress(&mut state.conversation_messages, &self.archival)
            .await;
        state.conversation_messages.len()
    }

    /// Run one session turn to a final answer, error, or step-limit exit,
    /// returning a stream of step events (§6 `run_streaming`).
    #[instrument(skip(self), fields(agent_id = %self.agent_id))]
    pub async fn run_streaming(self: &Arc<Self>, user_message: String) -> StepStream {
        let step_stream = StepStream::new(self.config.step_stream_buffer);
        let emitter = step_stream.emitter.clone();
        let this = self.clone();

        this.relay.register(this.agent_id.clone(), emitter.clone()).await;

        tokio::spawn(async move {
            let outcome = tokio::time::timeout(
                this.config.global_timeout,
                this.drive(user_message, None, &emitter),
            )
            .await;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("agent loop run failed: {}", e);
                    emitter
                        .emit(StepEvent::new(0, StepKind::Error, format!("internal error: {e}")))
                        .await;
                }
                Err(_) => {
                    warn!("agent loop run exceeded global execution timeout");
                    emitter
                        .emit(StepEvent::new(0, StepKind::Error, "run exceeded the global execution timeout"))
                        .await;
                }
            }

            this.relay.deregister(&this.agent_id).await;
        });

        step_stream
    }

    /// Non-streaming aggregate form (§6 `run`): drains the stream and
    /// reports whether it ended in a final answer.
    pub async fn run(self: &Arc<Self>, user_message: String) -> RunOutcome {
        let step_stream = self.run_streaming(user_message).await;
        let steps = crate::stream::collect(step_stream.stream).await;
        let success = matches!(steps.last().map(|s| s.kind), Some(StepKind::FinalAnswer));
        let final_output = steps
            .iter()
            .rev()
            .find(|s| s.kind == StepKind::FinalAnswer)
            .map(|s| s.content.clone())
            .unwrap_or_default();
        RunOutcome {
            final_output,
            steps,
            success,
        }
    }

    /// Restore a paused run from a checkpoint and continue it for at most
    /// the profile's remaining step budget (§6 `resume`, §8 scenario 6).
    pub async fn resume(self: &Arc<Self>, cp: Checkpoint) -> Result<StepStream> {
        let payload: CheckpointPayload = serde_json::from_value(cp.payload.clone())?;
        for (label, content) in &payload.memory_blocks {
            self.core_memory.ensure_block(&self.agent_id, label, false).await?;
            self.core_memory.replace(&self.agent_id, label, content).await?;
        }

        let step_stream = StepStream::new(self.config.step_stream_buffer);
        let emitter = step_stream.emitter.clone();
        let this = self.clone();
        let resumed_from = cp.clone();

        this.relay.register(this.agent_id.clone(), emitter.clone()).await;

        tokio::spawn(async move {
            let outcome = tokio::time::timeout(
                this.config.global_timeout,
                this.drive(payload.user_message, Some((payload.working_messages, resumed_from.step_number as u32, resumed_from.id)), &emitter),
            )
            .await;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    let _ = this.checkpoint_store.set_status(resumed_from.id, CheckpointStatus::Failed).await;
                    emitter
                        .emit(StepEvent::new(0, StepKind::Error, format!("resumed run failed: {e}")))
                        .await;
                }
                Err(_) => {
                    emitter
                        .emit(StepEvent::new(0, StepKind::Error, "resumed run exceeded the global execution timeout"))
                        .await;
                }
            }

            this.relay.deregister(&this.agent_id).await;
        });

        Ok(step_stream)
    }

    /// The S0–S7 state machine itself. `resume_from` carries
    /// `(working_messages, starting_step, checkpoint_id)` when continuing a
    /// paused run rather than starting fresh.
    async fn drive(
        self: &Arc<Self>,
        user_message: String,
        resume_from: Option<(Vec<Message>, u32, Uuid)>,
        emitter: &StepEmitter,
    ) -> Result<()> {
        let step_limit = self.settings.step_limit(self.profile);
        let (mut working, mut step_number, resuming_checkpoint) = match resume_from {
            Some((messages, starting_step, cp_id)) => (messages, starting_step, Some(cp_id)),
            None => {
                let mut working = self.state.lock().await.conversation_messages.clone();
                if working.is_empty() {
                    working.push(Message::system(""));
                }
                working.push(Message::user(user_message.clone()));
                (working, 0, None)
            }
        };

        // Owned for the lifetime of this run only: rule state never persists
        // across runs, so it needs no place in the shared, mutex-guarded
        // `LoopState` (which would otherwise hold that lock for the whole
        // run, starving `export_history`/`inject_conversation_history` calls
        // from any other task for as long as this run takes).
        let mut rule_engine = ToolRuleEngine::for_profile(self.profile);
        let mut context_manager = ContextManager::new(default_context_policy(&self.settings));
        let mut llm_error_count: u32 = 0;
        let mut tool_error_streak: u32 = 0;
        let mut cached_memory_section = String::new();

        let final_text = loop {
            step_number += 1;

            if step_number > step_limit {
                info!("step limit {} reached, emitting synthetic summary", step_limit);
                let summary = "Reached the step limit before finishing this task.".to_string();
                emitter
                    .emit(StepEvent::new(step_number, StepKind::FinalAnswer, summary.clone()))
                    .await;
                break summary;
            }

            // S0 START
            if step_number == 1 || step_number % 3 == 1 {
                cached_memory_section = self.compile_memory_section(&user_message).await?;
            }
            let system_prompt = self.build_system_prompt(&cached_memory_section, &context_manager).await;
            working[0] = Message::system(system_prompt);
            emitter
                .emit(StepEvent::new(step_number, StepKind::Think, "Analyzing..."))
                .await;

            if step_number % 2 == 0 {
                let _ = context_manager.maybe_compress(&mut working, &self.archival).await?;
            }

            // S1 LLM_CALL
            let generation = match self.call_llm_with_retry(&working, step_number, &mut llm_error_count, emitter).await {
                Ok(g) => g,
                Err(e) => {
                    emitter
                        .emit(StepEvent::new(step_number, StepKind::Error, format!("aborting run: {e}")))
                        .await;
                    return Err(e);
                }
            };

            // S2 PARSE
            let mut calls = ToolCallParser::parse(&generation.content);
            let mut parsed = calls.remove(0);

            // S3 EMIT_THOUGHTS
            if !parsed.thoughts.is_empty() {
                emitter
                    .emit(StepEvent::new(step_number, StepKind::Think, parsed.thoughts.join(" ")))
                    .await;
            }

            // S4 DISPATCH
            if parsed.name == RESPONSE_TOOL {
                let answer_text = extract_answer_text(&parsed);
                let recovered = ToolCallParser::parse(&answer_text).remove(0);
                if recovered.name != RESPONSE_TOOL {
                    parsed = recovered;
                } else {
                    working.push(Message::assistant(answer_text.clone()));
                    emitter
                        .emit(StepEvent::new(step_number, StepKind::FinalAnswer, answer_text.clone()))
                        .await;
                    break answer_text;
                }
            }

            // S5 RULE_GATE
            if rule_engine.is_at_limit(&parsed.name) {
                warn!("rule-gate rejected dispatch of '{}': per-run call limit reached", parsed.name);
                let notice = format!(
                    "Tool '{}' has reached its call limit for this run. Choose a different approach.",
                    parsed.name
                );
                working.push(Message::user(notice.clone()));
                emitter
                    .emit(StepEvent::new(step_number, StepKind::Error, notice))
                    .await;
                continue;
            }

            // S6 EXECUTE
            let call_id = Uuid::new_v4().to_string();
            let mut arguments = serde_json::to_value(&parsed.arguments).unwrap_or(Value::Null);
            if let Some(obj) = arguments.as_object_mut() {
                obj.insert("_agent_id".to_string(), Value::String(self.agent_id.clone()));
            }
            working.push(Message::assistant(render_tool_call(&parsed)));
            emitter
                .emit(
                    StepEvent::new(step_number, StepKind::ToolCall, render_tool_call(&parsed))
                        .with_tool(parsed.name.clone(), true)
                        .with_confidence(parsed.confidence.unwrap_or(1.0)),
                )
                .await;

            let is_delegation = DELEGATION_TOOLS.contains(&parsed.name.as_str());
            if is_delegation {
                emitter
                    .emit(
                        StepEvent::new(step_number, StepKind::SubAgentSpawn, format!("delegating via {}", parsed.name))
                            .with_tool(parsed.name.clone(), true),
                    )
                    .await;
            }

            let call = ToolCall {
                id: call_id.clone(),
                name: parsed.name.clone(),
                arguments,
            };
            let timeout = if is_delegation { self.config.delegation_timeout } else { self.config.tool_timeout };
            let result = match tokio::time::timeout(timeout, self.tools.execute(&call)).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => ToolResult::failure(e.to_string()),
                Err(_) => ToolResult::failure(format!(
                    "tool '{}' timed out after {}s",
                    parsed.name,
                    timeout.as_secs()
                )),
            };

            emitter
                .emit(
                    StepEvent::new(
                        step_number,
                        if is_delegation { StepKind::SubAgentResult } else { StepKind::ToolResult },
                        result.to_string(),
                    )
                    .with_tool(parsed.name.clone(), result.success),
                )
                .await;

            rule_engine.record(&parsed.name);

            if step_number % self.config.checkpoint_every_steps == 0 || step_number == 1 {
                let payload = CheckpointPayload {
                    working_messages: working.clone(),
                    memory_blocks: self
                        .core_memory
                        .get_all(&self.agent_id)
                        .await?
                        .into_iter()
                        .map(|b| (b.label, b.content))
                        .collect(),
                    user_message: user_message.clone(),
                };
                let cp_id = resuming_checkpoint.unwrap_or_else(Uuid::new_v4);
                let mut cp = Checkpoint::new(&self.agent_id, step_number, serde_json::to_value(&payload)?);
                cp.id = cp_id;
                let cp_id_str = cp.id.to_string();
                self.checkpoint_store.save_detached(cp);
                emitter
                    .emit(StepEvent::new(step_number, StepKind::Checkpoint, "checkpoint saved").with_checkpoint(cp_id_str))
                    .await;
            }
            if step_number % self.config.checkpoint_prune_every_steps == 0 {
                let store = self.checkpoint_store.clone();
                let agent_id = self.agent_id.clone();
                let keep = self.config.checkpoint_keep;
                tokio::spawn(async move {
                    if let Err(e) = store.prune(&agent_id, keep).await {
                        error!("checkpoint prune failed: {}", e);
                    }
                });
            }

            if rule_engine.should_terminate(&parsed.name) {
                let final_text = result.to_string();
                emitter
                    .emit(StepEvent::new(step_number, StepKind::FinalAnswer, final_text.clone()))
                    .await;
                break final_text;
            }

            // S7 FEED_BACK
            let mut feedback = result.to_string();
            if feedback.len() > self.config.max_tool_result_chars {
                feedback.truncate(self.config.max_tool_result_chars);
                feedback.push_str("\n[... elided: tool result truncated ...]");
            }
            if result.success {
                tool_error_streak = 0;
            } else {
                tool_error_streak += 1;
                if tool_error_streak < 3 {
                    feedback.push_str(&format!(
                        "\n\n[Tool failed, attempt {tool_error_streak}/3 — try again or try a different approach.]"
                    ));
                } else {
                    feedback.push_str(
                        "\n\n[Tool failed 3 times in a row. Explain the situation via the response tool and stop retrying.]",
                    );
                }
            }
            working.push(Message::user(format!("[tool_result] {feedback}")));

            tokio::time::sleep(self.config.inter_step_sleep).await;
        };

        // Overflow protocol (§4.4): runs after every terminal response.
        if let Err(e) = self.core_memory.run_overflow_protocol(&self.agent_id, &self.archival).await {
            warn!("core memory overflow protocol failed: {}", e);
        }

        if let Some(cp_id) = resuming_checkpoint {
            let _ = self.checkpoint_store.set_status(cp_id, CheckpointStatus::Completed).await;
        }

        {
            let mut state = self.state.lock().await;
            state.conversation_messages.push(Message::user(user_message));
            state.conversation_messages.push(Message::assistant(final_text));
            trim_history(&mut state.conversation_messages, self.config.max_pairs, self.config.message_truncate_chars);
        }

        Ok(())
    }

    async fn call_llm_with_retry(
        &self,
        messages: &[Message],
        step_number: u32,
        llm_error_count: &mut u32,
        emitter: &StepEmitter,
    ) -> Result<GenerationResult> {
        loop {
            let attempt = tokio::time::timeout(
                self.config.llm_call_timeout,
                self.llm_client.generate(messages, &GenerationOptions::balanced()),
            )
            .await;

            let result = match attempt {
                Ok(inner) => inner,
                Err(_) => Err(Error::LlmTimeout(format!(
                    "exceeded {}s per-step timeout",
                    self.config.llm_call_timeout.as_secs()
                ))),
            };

            match result {
                Ok(generation) => return Ok(generation),
                Err(e) => {
                    *llm_error_count += 1;
                    emitter
                        .emit(StepEvent::new(
                            step_number,
                            StepKind::Error,
                            format!("LLM call failed (attempt {}/{}): {e}", llm_error_count, self.config.max_llm_retries),
                        ))
                        .await;
                    if *llm_error_count >= self.config.max_llm_retries {
                        return Err(e);
                    }
                    tokio::time::sleep(Duration::from_secs(u64::from(*llm_error_count) * 2)).await;
                }
            }
        }
    }

    /// Top-K tagged memories plus compiled core blocks, recompiled on a
    /// three-step cadence (§4.6 "memory re-compile into the system prompt at
    /// most every third step").
    async fn compile_memory_section(&self, user_message: &str) -> Result<String> {
        let limit = self.settings.memory_max_results();
        let relevant = self.tagged.retrieve(&self.agent_id, user_message, limit).await.unwrap_or_default();
        let core_blocks = self.core_memory.get_all(&self.agent_id).await?;
        let mut section = String::new();
        if !core_blocks.is_empty() {
            section.push_str("## Core Memory\n");
            for block in &core_blocks {
                section.push_str(&format!("### {}\n{}\n", block.label, block.content));
            }
        }
        section.push_str(&relevant);
        Ok(section)
    }

    /// Pure string composition (§9 "Autonomy directives are pure string
    /// composition"): base template + tool catalog + personality/tone/
    /// language/verbosity from settings + compiled memory + a context-usage
    /// gauge.
    async fn build_system_prompt(&self, memory_section: &str, context_manager: &ContextManager) -> String {
        let agent_name = self.settings.agent_name();
        let personality = self.settings.personality();
        let tone = self.settings.tone();
        let language = self.settings.language();
        let verbosity = self.settings.verbosity();
        let autonomy_level = self.settings.autonomy_level();
        let gauge = match context_manager.last_prompt_tokens() {
            Some(tokens) => format!("{tokens} tokens used this session (estimated)"),
            None => "token usage not yet estimated".to_string(),
        };

        build_system_prompt(&[
            format!("You are {agent_name}, an autonomous agent. Profile: {}.", self.profile),
            format!("Personality: {personality}. Tone: {tone}. Language: {language}. Verbosity: {verbosity}."),
            format!("Autonomy level: {autonomy_level} (1=ask before acting, 3=act independently)."),
            "## Available tools".to_string(),
            self.tools.tool_catalog(),
            memory_section.to_string(),
            format!("## Context usage\n{gauge}"),
        ])
    }
}

/// Compose a system prompt from ordered, already-rendered parts (§9
/// `build_system_prompt(parts)`), skipping empty sections.
fn build_system_prompt(parts: &[String]) -> String {
    parts.iter().filter(|p| !p.trim().is_empty()).cloned().collect::<Vec<_>>().join("\n\n")
}

fn default_context_policy(settings: &Arc<dyn Settings>) -> ContextPolicy {
    ContextPolicy {
        window_size: settings.window_size(),
        compression_threshold: settings.compression_threshold(),
        auto_compress: settings.auto_compress(),
        ..ContextPolicy::default()
    }
}

/// Trim the persisted history to `max_pairs * 2` entries and each entry to
/// `truncate_chars`, preserving the system prompt at index 0 (§4.8
/// "conversation history management").
fn trim_history(messages: &mut Vec<Message>, max_pairs: usize, truncate_chars: usize) {
    for m in messages.iter_mut() {
        if m.content.len() > truncate_chars {
            m.content.truncate(truncate_chars);
            m.content.push_str("... [truncated]");
        }
    }
    let preserved_head = 1.min(messages.len());
    let cap = preserved_head + max_pairs * 2;
    if messages.len() > cap {
        let excess = messages.len() - cap;
        messages.drain(preserved_head..preserved_head + excess);
    }
}

/// Multi-key fallback for the `response` tool's answer text (§4.8 S4).
fn extract_answer_text(call: &ParsedToolCall) -> String {
    for key in ANSWER_TEXT_KEYS {
        if let Some(text) = call.arguments.get(*key) {
            if !text.is_empty() {
                return text.clone();
            }
        }
    }
    call.arguments.values().cloned().collect::<Vec<_>>().join(" ")
}

fn render_tool_call(call: &ParsedToolCall) -> String {
    let args = call
        .arguments
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{}({})", call.name, args)
}

/// Spawns fresh child `AgentLoop`s for delegation tools (§4.11), sharing the
/// parent's stores but not its conversation history — each delegated call
/// gets its own `agent_id` and a clean session.
pub struct AgentLoopFactory {
    llm_client: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    core_memory: CoreMemoryStore,
    archival: ArchivalStore,
    tagged: TaggedMemoryStore,
    checkpoint_store: CheckpointStore,
    settings: Arc<dyn Settings>,
    relay: SubAgentRelay,
    config: AgentLoopConfig,
}

impl AgentLoopFactory {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        llm_client: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        core_memory: CoreMemoryStore,
        archival: ArchivalStore,
        tagged: TaggedMemoryStore,
        checkpoint_store: CheckpointStore,
        settings: Arc<dyn Settings>,
        relay: SubAgentRelay,
        config: AgentLoopConfig,
    ) -> Self {
        AgentLoopFactory {
            llm_client,
            tools,
            core_memory,
            archival,
            tagged,
            checkpoint_store,
            settings,
            relay,
            config,
        }
    }

    pub async fn spawn(&self, profile: Profile) -> Result<Arc<AgentLoop>> {
        let agent_id = format!("sub-{}", Uuid::new_v4());
        let agent_loop = AgentLoop::new(
            agent_id,
            profile,
            self.llm_client.clone(),
            self.tools.clone(),
            self.core_memory.clone(),
            self.archival.clone(),
            self.tagged.clone(),
            self.checkpoint_store.clone(),
            self.settings.clone(),
            self.relay.clone(),
            self.config.clone(),
        )
        .await?;
        Ok(Arc::new(agent_loop))
    }
}

#[async_trait]
impl SubAgentRunner for AgentLoopFactory {
    async fn run_subordinate(&self, profile: Profile, message: String, relay_id: &str) -> Result<String> {
        let child = self.spawn(profile).await?;
        let step_stream = child.run_streaming(message).await;
        let mut events = step_stream.stream;
        let mut final_text = String::new();
        while let Some(event) = events.next().await {
            if event.kind == StepKind::FinalAnswer {
                final_text = event.content.clone();
            }
            self.relay.forward(relay_id, event).await;
        }
        Ok(final_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_text_prefers_earlier_keys() {
        let mut arguments = HashMap::new();
        arguments.insert("content".to_string(), "fallback".to_string());
        arguments.insert("text".to_string(), "primary".to_string());
        let call = ParsedToolCall {
            name: "response".to_string(),
            arguments,
            thoughts: vec![],
            confidence: None,
        };
        assert_eq!(extract_answer_text(&call), "primary");
    }

    #[test]
    fn trim_history_preserves_system_prompt_and_caps_pairs() {
        let mut messages = vec![Message::system("sys")];
        for i in 0..600 {
            messages.push(Message::user(format!("turn {i}")));
        }
        trim_history(&mut messages, 250, 4000);
        assert_eq!(messages[0].content, "sys");
        assert_eq!(messages.len(), 1 + 250 * 2);
    }

    #[test]
    fn trim_history_truncates_long_entries() {
        let mut messages = vec![Message::system("sys"), Message::user("x".repeat(5000))];
        trim_history(&mut messages, 250, 4000);
        assert!(messages[1].content.len() <= 4000 + "... [truncated]".len());
    }

    #[test]
    fn build_system_prompt_skips_empty_sections() {
        let prompt = build_system_prompt(&["a".to_string(), "".to_string(), "b".to_string()]);
        assert_eq!(prompt, "a\n\nb");
    }

    #[test]
    fn render_tool_call_includes_name_and_args() {
        let mut arguments = HashMap::new();
        arguments.insert("command".to_string(), "ls".to_string());
        let call = ParsedToolCall {
            name: "shell".to_string(),
            arguments,
            thoughts: vec![],
            confidence: None,
        };
        assert_eq!(render_tool_call(&call), "shell(command=ls)");
    }
}
