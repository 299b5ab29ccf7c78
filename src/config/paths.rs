//! Configuration and state directory resolution
//!
//! Kept near verbatim from the teacher's `config/paths.rs`, renamed to this
//! crate's namespace.

use std::path::PathBuf;

/// Directory containing the configuration file.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AGENTCORE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::config_dir()
        .map(|d| d.join("agentcore"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".config").join("agentcore"))
                .unwrap_or_else(|| PathBuf::from(".agentcore"))
        })
}

/// Path to the main configuration file.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("AGENTCORE_CONFIG") {
        return PathBuf::from(path);
    }
    config_dir().join("config.toml")
}

/// Directory for runtime state (not used by this crate directly, since
/// checkpoint/memory persistence goes through Postgres, but kept for parity
/// with any local caches the embedding service creates).
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AGENTCORE_STATE_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|d| d.join("agentcore"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".local").join("share").join("agentcore"))
                .unwrap_or_else(|| PathBuf::from(".agentcore"))
        })
}

/// Ensure a directory exists.
pub fn ensure_dir(path: &PathBuf) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_do_not_panic() {
        let _ = config_dir();
        let _ = config_path();
        let _ = state_dir();
    }
}
