//! Configuration I/O - loading and saving
//!
//! Grounded on `config/io.rs` in the codebase this runtime is built from,
//! narrowed to a single file format (TOML) plus environment overrides.

use std::path::Path;

use super::types::Config;
use crate::error::Result;

/// A snapshot of the configuration file, used for diagnostics.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub path: std::path::PathBuf,
    pub exists: bool,
    pub raw: Option<String>,
    pub config: Option<Config>,
    pub issues: Vec<String>,
}

/// Load configuration from the default path, falling back to environment
/// variables if no file is present.
pub fn load_config() -> Result<Config> {
    let config_path = super::paths::config_path();
    if config_path.exists() {
        load_config_from_path(&config_path)
    } else {
        load_config_from_env()
    }
}

/// Load configuration from a specific TOML file.
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&content)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Load configuration from defaults, then apply environment overrides.
pub fn load_config_from_env() -> Result<Config> {
    dotenvy::dotenv().ok();
    let mut config = Config::default();
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Overlay recognized environment variables onto an existing configuration.
/// Applied after file load so env always wins, matching the teacher's
/// layered precedence (defaults < file < env).
pub fn apply_env_overrides(config: &mut Config) {
    use secrecy::SecretString;

    if let Ok(v) = std::env::var("AGENTCORE_API_KEY") {
        config.llm.api_key = SecretString::from(v);
    }
    if let Ok(v) = std::env::var("AGENTCORE_MODEL") {
        config.llm.default_model = v;
    }
    if let Ok(v) = std::env::var("AGENTCORE_BASE_URL") {
        config.llm.base_url = v;
    }
    if let Ok(v) = std::env::var("DATABASE_URL") {
        config.database.url = SecretString::from(v);
    }
    if let Ok(v) = std::env::var("AGENTCORE_WORKER_POOL_SIZE") {
        if let Ok(n) = v.parse() {
            config.runtime.worker_pool_size = n;
        }
    }
    if let Ok(v) = std::env::var("AGENTCORE_WINDOW_SIZE") {
        if let Ok(n) = v.parse() {
            config.runtime.window_size = n;
        }
    }
    if let Ok(v) = std::env::var("RUST_LOG") {
        config.log.level = v;
    }
}

/// Save configuration to a TOML file, creating parent directories as needed.
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Read a configuration file into a diagnostic snapshot without failing hard.
pub fn read_config_snapshot(path: &Path) -> ConfigSnapshot {
    if !path.exists() {
        return ConfigSnapshot {
            path: path.to_path_buf(),
            exists: false,
            raw: None,
            config: None,
            issues: vec!["Configuration file does not exist".to_string()],
        };
    }

    let raw = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            return ConfigSnapshot {
                path: path.to_path_buf(),
                exists: true,
                raw: None,
                config: None,
                issues: vec![format!("Failed to read file: {}", e)],
            };
        }
    };

    match load_config_from_path(path) {
        Ok(config) => ConfigSnapshot {
            path: path.to_path_buf(),
            exists: true,
            raw: Some(raw),
            config: Some(config),
            issues: Vec::new(),
        },
        Err(e) => ConfigSnapshot {
            path: path.to_path_buf(),
            exists: true,
            raw: Some(raw),
            config: None,
            issues: vec![format!("Failed to parse config: {}", e)],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::default();
        save_config(&config, &path).unwrap();

        let loaded = load_config_from_path(&path).unwrap();
        assert_eq!(loaded.runtime.window_size, config.runtime.window_size);
    }

    #[test]
    fn env_override_wins_over_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        save_config(&Config::default(), &path).unwrap();

        std::env::set_var("AGENTCORE_WINDOW_SIZE", "4096");
        let loaded = load_config_from_path(&path).unwrap();
        std::env::remove_var("AGENTCORE_WINDOW_SIZE");

        assert_eq!(loaded.runtime.window_size, 4096);
    }
}
