//! Error types for the agent runtime

use thiserror::Error;

/// Result type alias using the runtime's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type. Each LLM/tool/stream error kind named in the design
/// has its own variant so callers can branch on retryability without a
/// catch-all string match.
#[derive(Error, Debug)]
pub enum Error {
    /// The LLM call exceeded its per-step or cancellation-grace deadline.
    #[error("LLM call timed out: {0}")]
    LlmTimeout(String),

    /// Transport-level failure talking to the LLM provider (connection, status code, bad body).
    #[error("LLM transport error: {0}")]
    LlmTransport(String),

    /// A tool execution exceeded its per-call timeout.
    #[error("Tool '{tool}' timed out after {elapsed_secs}s")]
    ToolTimeout { tool: String, elapsed_secs: u64 },

    /// A tool executed but reported failure.
    #[error("Tool '{tool}' failed: {message}")]
    ToolFailure { tool: String, message: String },

    /// The run or call was cancelled cooperatively; not inherently an error.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error.
    #[error("Environment error: {0}")]
    Env(#[from] std::env::VarError),

    /// Invalid input from a caller.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Requested resource (checkpoint, memory entry, worker) not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Catch-all for bugs and invariant violations that should never surface
    /// to the user verbatim (see SPEC_FULL.md §7: streams must never hang,
    /// and raw errors must never leak into `final_answer`).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether retrying the operation that produced this error is sensible.
    /// Drives the loop's own LLM retry policy (§4.8 S1) and any external
    /// caller's backoff decisions.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::LlmTimeout(_)
                | Error::LlmTransport(_)
                | Error::ToolTimeout { .. }
                | Error::Http(_)
                | Error::Database(_)
        )
    }

    /// Whether the error originates from caller-supplied input rather than
    /// a transport or internal fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::NotFound(_))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_errors_are_retryable() {
        assert!(Error::LlmTimeout("slow".into()).is_retryable());
        assert!(Error::LlmTransport("connection reset".into()).is_retryable());
    }

    #[test]
    fn tool_failure_is_not_retryable() {
        assert!(!Error::ToolFailure {
            tool: "shell".into(),
            message: "boom".into()
        }
        .is_retryable());
    }

    #[test]
    fn client_errors_are_not_retryable_by_default() {
        let e = Error::InvalidInput("bad profile".into());
        assert!(e.is_client_error());
        assert!(!e.is_retryable());
    }
}
