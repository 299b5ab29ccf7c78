//! Configuration validation

use super::types::Config;

/// Result of validating a configuration.
#[derive(Debug, Clone)]
pub struct ConfigValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ConfigValidationResult {
    pub fn valid() -> Self {
        ConfigValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_error(mut self, issue: ValidationIssue) -> Self {
        self.valid = false;
        self.errors.push(issue);
        self
    }

    pub fn with_warning(mut self, issue: ValidationIssue) -> Self {
        self.warnings.push(issue);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Validate a configuration: worker pool bounds, compression threshold range,
/// and presence of a database URL (required since checkpoints/memory persist
/// through Postgres).
pub fn validate_config(config: &Config) -> ConfigValidationResult {
    use secrecy::ExposeSecret;

    let mut result = ConfigValidationResult::valid();

    if !(1..=16).contains(&config.runtime.worker_pool_size) {
        result = result.with_error(
            ValidationIssue::new(
                "runtime.worker_pool_size",
                format!(
                    "worker_pool_size {} is outside the allowed range [1, 16]",
                    config.runtime.worker_pool_size
                ),
            )
            .with_suggestion("Set worker_pool_size between 1 and 16"),
        );
    }

    if !(0.0..=1.0).contains(&config.runtime.compression_threshold) {
        result = result.with_error(ValidationIssue::new(
            "runtime.compression_threshold",
            "compression_threshold must be in [0.0, 1.0]",
        ));
    }

    if config.database.url.expose_secret().is_empty() {
        result = result.with_warning(
            ValidationIssue::new(
                "database.url",
                "No DATABASE_URL configured; checkpoint and tagged/archival memory persistence will fail",
            )
            .with_suggestion("Set DATABASE_URL or database.url"),
        );
    }

    if !config.llm.is_cloud() {
        result = result.with_warning(ValidationIssue::new(
            "llm.api_key",
            "No LLM API key configured; falling back to the local provider base_url",
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_errors() {
        let config = Config::default();
        let result = validate_config(&config);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn out_of_range_pool_size_is_an_error() {
        let mut config = Config::default();
        config.runtime.worker_pool_size = 32;
        let result = validate_config(&config);
        assert!(!result.valid);
    }
}
