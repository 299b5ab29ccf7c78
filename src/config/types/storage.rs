//! Storage and embedding configuration
//!
//! The runtime persists checkpoints and tagged/archival memory through
//! PostgreSQL + pgvector (SPEC_FULL.md §10, grounded on `database/memory.rs`
//! and `database/postgres.rs`).

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// PostgreSQL connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL.
    #[serde(skip_serializing, default = "default_secret")]
    pub url: SecretString,
    /// Maximum pool connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url: default_secret(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_secret() -> SecretString {
    SecretString::from(String::new())
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    30
}

/// Local embedding generation configuration (SPEC_FULL.md §4.4 semantic tier).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model identifier (informational; the embedding service currently wraps one fixed model).
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Embedding vector width, must match the model.
    #[serde(default = "default_embedding_dims")]
    pub dimensions: u32,
    /// Whether semantic retrieval is attempted before the lexical fallback.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            model: default_embedding_model(),
            dimensions: default_embedding_dims(),
            enabled: true,
        }
    }
}

fn default_embedding_model() -> String {
    "multilingual-e5-small".to_string()
}

fn default_embedding_dims() -> u32 {
    384
}

fn default_true() -> bool {
    true
}
