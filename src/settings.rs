//! Thin settings interface
//!
//! SPEC_FULL.md §9 ("Global settings state") asks that core logic read
//! configuration through "a thin settings interface with one method per
//! option" rather than reaching into a config struct directly, so that the
//! loop can re-read live edits once per turn without coupling to storage.
//! `Settings` is that interface; `ConfigSettings` is the one implementation,
//! backed by a loaded `Config`.

use crate::config::{Config, MemoryPolicy, Profile};
use std::sync::{Arc, RwLock};

/// One accessor per recognized option (SPEC_FULL.md §6).
pub trait Settings: Send + Sync {
    fn window_size(&self) -> u32;
    fn compression_threshold(&self) -> f32;
    fn auto_compress(&self) -> bool;
    fn worker_pool_size(&self) -> usize;
    fn step_limit(&self, profile: Profile) -> u32;
    fn autonomy_level(&self) -> u8;
    fn memory_policy(&self) -> MemoryPolicy;
    fn personality(&self) -> String;
    fn tone(&self) -> String;
    fn language(&self) -> String;
    fn verbosity(&self) -> String;
    fn user_name(&self) -> Option<String>;
    fn agent_name(&self) -> String;
    fn memory_autosave(&self) -> bool;
    fn memory_memorize_enabled(&self) -> bool;
    fn memory_max_results(&self) -> usize;
}

/// `Settings` backed by a live, swappable `Config`. The loop holds an
/// `Arc<dyn Settings>` and re-reads it each turn; an operator can call
/// `ConfigSettings::replace` to apply edits without restarting workers.
#[derive(Clone)]
pub struct ConfigSettings {
    inner: Arc<RwLock<Config>>,
}

impl ConfigSettings {
    pub fn new(config: Config) -> Self {
        ConfigSettings {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Atomically replace the live configuration (e.g. after an external edit).
    pub async fn replace(&self, config: Config) {
        *self.inner.write().expect("settings lock poisoned") = config;
    }

    fn snapshot(&self) -> Config {
        self.inner.read().expect("settings lock poisoned").clone()
    }
}

impl Settings for ConfigSettings {
    fn window_size(&self) -> u32 {
        self.snapshot().runtime.window_size
    }
    fn compression_threshold(&self) -> f32 {
        self.snapshot().runtime.compression_threshold
    }
    fn auto_compress(&self) -> bool {
        self.snapshot().runtime.auto_compress
    }
    fn worker_pool_size(&self) -> usize {
        self.snapshot().runtime.worker_pool_size
    }
    fn step_limit(&self, profile: Profile) -> u32 {
        self.snapshot().runtime.step_limit(profile)
    }
    fn autonomy_level(&self) -> u8 {
        self.snapshot().runtime.autonomy_level
    }
    fn memory_policy(&self) -> MemoryPolicy {
        self.snapshot().runtime.memory_policy
    }
    fn personality(&self) -> String {
        self.snapshot().prompt.personality
    }
    fn tone(&self) -> String {
        self.snapshot().prompt.tone
    }
    fn language(&self) -> String {
        self.snapshot().prompt.language
    }
    fn verbosity(&self) -> String {
        self.snapshot().prompt.verbosity
    }
    fn user_name(&self) -> Option<String> {
        self.snapshot().prompt.user_name
    }
    fn agent_name(&self) -> String {
        self.snapshot().prompt.agent_name
    }
    fn memory_autosave(&self) -> bool {
        self.snapshot().memory.memory_autosave
    }
    fn memory_memorize_enabled(&self) -> bool {
        self.snapshot().memory.memory_memorize_enabled
    }
    fn memory_max_results(&self) -> usize {
        self.snapshot().memory.memory_max_results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_reflect_defaults() {
        let settings = ConfigSettings::new(Config::default());
        assert_eq!(settings.step_limit(Profile::Web), 200);
        assert_eq!(settings.worker_pool_size(), 4);
    }

    #[tokio::test]
    async fn replace_is_visible_to_subsequent_reads() {
        let settings = ConfigSettings::new(Config::default());
        let mut cfg = Config::default();
        cfg.runtime.worker_pool_size = 8;
        settings.replace(cfg).await;
        assert_eq!(settings.worker_pool_size(), 8);
    }
}
