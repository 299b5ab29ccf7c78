//! Configuration types
//!
//! Split into focused modules the way the codebase this runtime is built
//! from does it: `provider` (LLM transport), `storage` (persistence +
//! embeddings), and this module for the runtime/prompt/memory/log knobs
//! named in SPEC_FULL.md §6.

pub mod provider;
pub mod storage;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: provider::LlmConfig,
    #[serde(default)]
    pub database: storage::DatabaseConfig,
    #[serde(default)]
    pub embedding: storage::EmbeddingConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    pub fn from_env() -> crate::error::Result<Self> {
        super::load_config()
    }
}

/// Agent profile: selects step-limit defaults, rule set, and tool-description
/// tailoring (SPEC_FULL.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Web,
    Coder,
    General,
}

impl Profile {
    /// Default step-limit for this profile (§4.8).
    pub fn default_step_limit(self) -> u32 {
        match self {
            Profile::Web => 200,
            Profile::Coder => 150,
            Profile::General => 100,
        }
    }
}

impl Default for Profile {
    fn default() -> Self {
        Profile::General
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Profile::Web => "web",
            Profile::Coder => "coder",
            Profile::General => "general",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Profile {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "web" => Ok(Profile::Web),
            "coder" => Ok(Profile::Coder),
            "general" => Ok(Profile::General),
            other => Err(crate::error::Error::InvalidInput(format!(
                "unknown profile: {other}"
            ))),
        }
    }
}

/// Memory write policy (§6 `memory_policy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPolicy {
    #[default]
    Auto,
    Ask,
    Manual,
    Disabled,
}

/// Runtime budget/policy knobs (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_window_size")]
    pub window_size: u32,
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: f32,
    #[serde(default = "default_true")]
    pub auto_compress: bool,
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    #[serde(default = "default_step_limit_web")]
    pub step_limit_web: u32,
    #[serde(default = "default_step_limit_coder")]
    pub step_limit_coder: u32,
    #[serde(default = "default_step_limit_general")]
    pub step_limit_general: u32,
    #[serde(default = "default_autonomy_level")]
    pub autonomy_level: u8,
    #[serde(default)]
    pub memory_policy: MemoryPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            window_size: default_window_size(),
            compression_threshold: default_compression_threshold(),
            auto_compress: true,
            worker_pool_size: default_worker_pool_size(),
            step_limit_web: default_step_limit_web(),
            step_limit_coder: default_step_limit_coder(),
            step_limit_general: default_step_limit_general(),
            autonomy_level: default_autonomy_level(),
            memory_policy: MemoryPolicy::default(),
        }
    }
}

impl RuntimeConfig {
    /// Step limit for the given profile, honoring any profile-specific override.
    pub fn step_limit(&self, profile: Profile) -> u32 {
        match profile {
            Profile::Web => self.step_limit_web,
            Profile::Coder => self.step_limit_coder,
            Profile::General => self.step_limit_general,
        }
    }
}

fn default_window_size() -> u32 {
    32768
}
fn default_compression_threshold() -> f32 {
    0.8
}
fn default_worker_pool_size() -> usize {
    4
}
fn default_step_limit_web() -> u32 {
    200
}
fn default_step_limit_coder() -> u32 {
    150
}
fn default_step_limit_general() -> u32 {
    100
}
fn default_autonomy_level() -> u8 {
    2
}
fn default_true() -> bool {
    true
}

/// Prompt-composition inputs (§6, §4.8 "smart prompt composition").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default = "default_personality")]
    pub personality: String,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_verbosity")]
    pub verbosity: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default = "default_agent_name")]
    pub agent_name: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        PromptConfig {
            personality: default_personality(),
            tone: default_tone(),
            language: default_language(),
            verbosity: default_verbosity(),
            user_name: None,
            agent_name: default_agent_name(),
        }
    }
}

fn default_personality() -> String {
    "helpful, precise, and concise".to_string()
}
fn default_tone() -> String {
    "neutral".to_string()
}
fn default_language() -> String {
    "en".to_string()
}
fn default_verbosity() -> String {
    "normal".to_string()
}
fn default_agent_name() -> String {
    "Assistant".to_string()
}

/// Retrieval/commit behavior for memory (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_true")]
    pub memory_autosave: bool,
    #[serde(default = "default_true")]
    pub memory_memorize_enabled: bool,
    #[serde(default = "default_memory_max_results")]
    pub memory_max_results: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig {
            memory_autosave: true,
            memory_memorize_enabled: true,
            memory_max_results: default_memory_max_results(),
        }
    }
}

fn default_memory_max_results() -> usize {
    5
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info,agentcore=debug".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_step_limits_match_spec() {
        let rc = RuntimeConfig::default();
        assert_eq!(rc.step_limit(Profile::Web), 200);
        assert_eq!(rc.step_limit(Profile::Coder), 150);
        assert_eq!(rc.step_limit(Profile::General), 100);
    }

    #[test]
    fn profile_from_str_rejects_unknown_values() {
        use std::str::FromStr;
        assert_eq!(Profile::from_str("coder").unwrap(), Profile::Coder);
        assert!(Profile::from_str("bogus").is_err());
    }

    #[test]
    fn config_default_round_trips_through_toml() {
        let cfg = Config::default();
        let text = toml::to_string(&cfg).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.runtime.window_size, cfg.runtime.window_size);
    }
}
