/// Configuration system for rosetta-search
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, RosettaError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Similarity backends understood by [`crate::similarity::create_oracle`]
pub const SIMILARITY_BACKENDS: &[&str] = &["lexical", "http", "embedding"];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Index location
    #[serde(default)]
    pub index: IndexConfig,

    /// TF-IDF scoring pass
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Similarity oracle configuration
    #[serde(default)]
    pub similarity: SimilarityConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Single-writer lock configuration
    #[serde(default)]
    pub lock: LockConfig,
}

/// Index location configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IndexConfig {
    /// Explicit SQLite index path; when unset a per-repository file under the
    /// platform data directory is used
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Number of association rows rewritten per transaction
    #[serde(default = "default_scoring_batch_size")]
    pub batch_size: usize,
}

/// Similarity oracle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Backend: "lexical", "http" or "embedding"
    #[serde(default = "default_similarity_backend")]
    pub backend: String,

    /// Endpoint of the HTTP similarity service
    #[serde(default = "default_similarity_url")]
    pub url: String,

    /// Embedding model (e.g., "all-MiniLM-L6-v2", "BAAI/bge-small-en-v1.5")
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Per-call timeout in milliseconds
    #[serde(default = "default_similarity_timeout_ms")]
    pub timeout_ms: u64,

    /// Budget in milliseconds for preparing a batch backend before a search
    /// (model load, vocabulary embedding)
    #[serde(default = "default_warm_up_timeout_ms")]
    pub warm_up_timeout_ms: u64,

    /// Maximum number of oracle calls in flight
    #[serde(default = "default_similarity_concurrency")]
    pub concurrency: usize,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// How many similar vocabulary tokens to keep per query token
    #[serde(default = "default_similar_tokens")]
    pub similar_tokens: usize,

    /// Default result limit
    #[serde(default = "default_result_limit")]
    pub limit: usize,

    /// Pairs scoring at or below this similarity are dropped (0.0 to 1.0)
    #[serde(default)]
    pub min_similarity: f32,
}

/// Lock configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LockConfig {
    /// Seconds to wait for the writer lock; 0 fails immediately when held
    #[serde(default)]
    pub wait_secs: u64,

    /// Directory for lock files; defaults to the platform data directory
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_scoring_batch_size() -> usize {
    500
}

fn default_similarity_backend() -> String {
    "lexical".to_string()
}

fn default_similarity_url() -> String {
    "http://127.0.0.1:8000/nltk/wup".to_string()
}

fn default_model_name() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_similarity_timeout_ms() -> u64 {
    2_000
}

fn default_warm_up_timeout_ms() -> u64 {
    30_000
}

fn default_similarity_concurrency() -> usize {
    16
}

fn default_similar_tokens() -> usize {
    10
}

fn default_result_limit() -> usize {
    20
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            batch_size: default_scoring_batch_size(),
        }
    }
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            backend: default_similarity_backend(),
            url: default_similarity_url(),
            model_name: default_model_name(),
            timeout_ms: default_similarity_timeout_ms(),
            warm_up_timeout_ms: default_warm_up_timeout_ms(),
            concurrency: default_similarity_concurrency(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            similar_tokens: default_similar_tokens(),
            limit: default_result_limit(),
            min_similarity: 0.0,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, RosettaError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or fall back to defaults
    pub fn load_or_default() -> Result<Self, RosettaError> {
        let config_path = crate::paths::PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::debug!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), RosettaError> {
        if !SIMILARITY_BACKENDS.contains(&self.similarity.backend.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "similarity.backend".to_string(),
                reason: format!(
                    "must be one of {}, got '{}'",
                    SIMILARITY_BACKENDS.join(", "),
                    self.similarity.backend
                ),
            }
            .into());
        }

        if self.similarity.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "similarity.concurrency".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.similarity.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "similarity.timeout_ms".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.similarity.warm_up_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "similarity.warm_up_timeout_ms".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.scoring.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "scoring.batch_size".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.search.similar_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                key: "search.similar_tokens".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.search.limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "search.limit".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if !(0.0..=1.0).contains(&self.search.min_similarity) {
            return Err(ConfigError::InvalidValue {
                key: "search.min_similarity".to_string(),
                reason: format!(
                    "must be between 0.0 and 1.0, got {}",
                    self.search.min_similarity
                ),
            }
            .into());
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("ROSETTA_INDEX_PATH") {
            self.index.path = Some(PathBuf::from(path));
        }

        if let Ok(backend) = std::env::var("ROSETTA_SIMILARITY_BACKEND") {
            self.similarity.backend = backend;
        }

        if let Ok(dir) = std::env::var("ROSETTA_LOCK_DIR") {
            self.lock.dir = Some(PathBuf::from(dir));
        }

        if let Ok(url) = std::env::var("ROSETTA_SIMILARITY_URL") {
            self.similarity.url = url;
        }

        if let Ok(limit) = std::env::var("ROSETTA_SEARCH_LIMIT")
            && let Ok(limit) = limit.parse()
        {
            self.search.limit = limit;
        }
    }

    /// Load from an explicit file (or the default location), apply environment
    /// overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self, RosettaError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::load_or_default()?,
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests;
