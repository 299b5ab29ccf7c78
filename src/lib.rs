//! # agentcore
//!
//! An agent execution runtime: a ReAct-style loop driving tool calls against
//! an LLM, a worker pool for concurrent sessions, multi-tier memory (core
//! blocks, archival, tagged retrieval), context-budget compression, and
//! checkpoint/resume.
//!
//! ## Layout
//!
//! - `config`/`settings`: typed configuration and the thin `Settings` read
//!   interface the loop consults each turn
//! - `llm`: the `LlmClient` transport trait and its OpenAI-compatible HTTP
//!   implementation
//! - `memory`: `CoreMemoryStore`, `ArchivalStore`, `TaggedMemoryStore`, and
//!   the embedding/caching/summarization plumbing behind them
//! - `tools`: the `Tool` trait, `ToolRegistry`, and the in-core tool
//!   families (memory, delegation)
//! - `parser`/`rules`: recovering tool calls from free-form model output and
//!   gating their dispatch
//! - `context`: context-budget estimation and compression
//! - `checkpoint`: durable run snapshots for pause/resume
//! - `stream`: step events and the cross-agent relay
//! - `agent_loop`/`pool`/`runtime`: the S0–S7 state machine, the worker
//!   pool that isolates concurrent sessions, and the `AgentRuntime` facade
//!   that ties them together
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use agentcore::config::Config;
//! use agentcore::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::from_env()?;
//!     // build stores, a WorkerPool, and an AgentRuntime from `config`...
//!     let _ = config;
//!     Ok(())
//! }
//! ```

pub mod agent_loop;
pub mod checkpoint;
#[path = "config/mod.rs"]
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod llm;
pub mod memory;
pub mod parser;
pub mod pool;
pub mod rules;
pub mod runtime;
pub mod settings;
pub mod stream;
pub mod tools;

pub use error::{Error, Result};
pub use llm::{Message, Role};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
