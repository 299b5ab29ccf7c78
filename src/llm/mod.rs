//! LLM transport (§4.7): message/role types plus the OpenAI-compatible client.

pub mod client;
pub mod types;

pub use client::{LlmClient, OpenAiCompatClient};
pub use types::{GenerationOptions, GenerationResult, Message, Role};
