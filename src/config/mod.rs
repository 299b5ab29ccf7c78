//! Configuration module - modular configuration management
//!
//! Follows the codebase this runtime is built from in splitting
//! configuration into focused modules:
//! - `types/mod.rs`: top-level `Config`, runtime/prompt/memory/log knobs
//! - `types/provider.rs`: LLM transport configuration
//! - `types/storage.rs`: database + embedding configuration
//! - `io.rs`: loading and saving
//! - `validation.rs`: configuration validation
//! - `paths.rs`: configuration file paths

mod io;
mod paths;
mod types;
mod validation;

pub use types::{Config, MemoryConfig, MemoryPolicy, Profile, PromptConfig, RuntimeConfig, LogConfig};
pub use types::provider::LlmConfig;
pub use types::storage::{DatabaseConfig, EmbeddingConfig};

pub use io::{apply_env_overrides, load_config, load_config_from_env, load_config_from_path, save_config, ConfigSnapshot};
pub use paths::{config_dir, config_path, state_dir};
pub use validation::{validate_config, ConfigValidationResult, ValidationIssue};
