//! Configuration management for askdb
//!
//! Handles loading and validation of the core's configuration. Validation
//! fails fast: a zero top-K or out-of-range BM25 parameter is rejected at
//! startup instead of silently producing degenerate scores.

use crate::error::{AskdbError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub retrieval: RetrievalConfig,
    pub session: SessionConfig,
    pub checkpoint: CheckpointConfig,
}

/// Join semantics for the parallel retrieval paths feeding rank fusion.
///
/// `RequireAll` fails fast if any path errors, so fusion never runs over a
/// silently partial set. `FirstSuccess` returns the first path that
/// completes successfully, trading fusion quality for latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinMode {
    RequireAll,
    FirstSuccess,
}

/// Retrieval and fusion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of fused documents returned to the generation stage
    pub top_k: usize,
    /// RRF smoothing constant (typically 60)
    pub rrf_k: f64,
    /// Join semantics for parallel retrieval paths
    pub join_mode: JoinMode,
    /// BM25 term-frequency saturation parameter (typical range 1.2-2.0)
    pub bm25_k1: f64,
    /// BM25 length-normalization parameter (range 0-1)
    pub bm25_b: f64,
}

/// Session registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory for the file-backed session store
    pub data_dir: PathBuf,
    /// History turns retained verbatim; older turns are compacted into the
    /// rolling summary
    pub max_history_len: usize,
}

/// Checkpoint store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Time-to-live for persisted checkpoints, in seconds
    pub ttl_secs: u64,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AskdbError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| AskdbError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| AskdbError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: ASKDB_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("ASKDB_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "RETRIEVAL__TOP_K" => {
                self.retrieval.top_k =
                    value.parse().map_err(|_| AskdbError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as integer", value),
                    })?;
            }
            "RETRIEVAL__JOIN_MODE" => {
                self.retrieval.join_mode = match value {
                    "require_all" => JoinMode::RequireAll,
                    "first_success" => JoinMode::FirstSuccess,
                    _ => {
                        return Err(AskdbError::InvalidConfigValue {
                            path: path.to_string(),
                            message: format!("Unknown join mode '{}'", value),
                        })
                    }
                };
            }
            "SESSION__MAX_HISTORY_LEN" => {
                self.session.max_history_len =
                    value.parse().map_err(|_| AskdbError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as integer", value),
                    })?;
            }
            "CHECKPOINT__TTL_SECS" => {
                self.checkpoint.ttl_secs =
                    value.parse().map_err(|_| AskdbError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as integer", value),
                    })?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            session: SessionConfig::default(),
            checkpoint: CheckpointConfig::default(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            rrf_k: 60.0,
            join_mode: JoinMode::RequireAll,
            bm25_k1: 1.5,
            bm25_b: 0.75,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./askdb-data"),
            max_history_len: 3,
        }
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        // 24 hours, matching the bounded checkpoint lifetime of the
        // execution protocol
        Self { ttl_secs: 24 * 60 * 60 }
    }
}
