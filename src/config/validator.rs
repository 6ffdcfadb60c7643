use crate::config::Config;
use crate::error::{AskdbError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_retrieval(config, &mut errors);
        Self::validate_session(config, &mut errors);
        Self::validate_checkpoint(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AskdbError::ConfigValidation { errors })
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.retrieval.top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.top_k",
                "top_k must be greater than 0",
            ));
        }

        if config.retrieval.rrf_k <= 0.0 {
            errors.push(ValidationError::new(
                "retrieval.rrf_k",
                format!(
                    "RRF smoothing constant must be positive, got {}",
                    config.retrieval.rrf_k
                ),
            ));
        }

        if config.retrieval.bm25_k1 < 0.0 {
            errors.push(ValidationError::new(
                "retrieval.bm25_k1",
                format!("k1 must be non-negative, got {}", config.retrieval.bm25_k1),
            ));
        }

        let b = config.retrieval.bm25_b;
        if !(0.0..=1.0).contains(&b) {
            errors.push(ValidationError::new(
                "retrieval.bm25_b",
                format!("b must be between 0.0 and 1.0, got {}", b),
            ));
        }
    }

    fn validate_session(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.session.max_history_len == 0 {
            errors.push(ValidationError::new(
                "session.max_history_len",
                "max_history_len must be greater than 0",
            ));
        }

        if config.session.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "session.data_dir",
                "Session data directory path cannot be empty",
            ));
        }
    }

    fn validate_checkpoint(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.checkpoint.ttl_secs == 0 {
            errors.push(ValidationError::new(
                "checkpoint.ttl_secs",
                "Checkpoint TTL must be greater than 0",
            ));
        }
    }
}
