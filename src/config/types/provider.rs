//! LLM provider configuration
//!
//! Cloud vs. local provider selection follows SPEC_FULL.md §4.7: presence of
//! a nonempty API key picks the cloud path; its absence falls back to a
//! local/self-hosted OpenAI-compatible endpoint.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// LLM transport configuration. `api_key` empty ⇒ local provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key; empty string selects the local provider path.
    #[serde(skip_serializing, default = "default_secret")]
    pub api_key: SecretString,
    /// Default model id for newly created workers.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Base URL of the OpenAI-compatible chat completions endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds (independent of the loop's own per-step timeout).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Maximum transport-level retries before surfacing `LlmTransport`.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            api_key: default_secret(),
            default_model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
        }
    }
}

impl LlmConfig {
    /// True when a cloud provider is configured (nonempty API key).
    pub fn is_cloud(&self) -> bool {
        use secrecy::ExposeSecret;
        !self.api_key.expose_secret().is_empty()
    }
}

fn default_secret() -> SecretString {
    SecretString::from(String::new())
}

fn default_model() -> String {
    "local/default".to_string()
}

fn default_base_url() -> String {
    "http://localhost:8080/v1".to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_retries() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_selects_local_provider() {
        let cfg = LlmConfig::default();
        assert!(!cfg.is_cloud());
    }

    #[test]
    fn nonempty_api_key_selects_cloud_provider() {
        let mut cfg = LlmConfig::default();
        cfg.api_key = SecretString::from("sk-test".to_string());
        assert!(cfg.is_cloud());
    }
}
