/// Centralized error types for rosetta-search using thiserror
///
/// The top-level [`RosettaError`] mirrors the failure taxonomy of the indexing
/// and query pipeline. Component errors are nested enums converted with `From`.
use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, RosettaError>;

/// Main error type for the indexing and search system
#[derive(Error, Debug)]
pub enum RosettaError {
    #[error("No usable git history at: {0}")]
    NotARepository(String),

    #[error("Index has not been built yet; run `create` first")]
    IndexNotInitialized,

    #[error("Index is already built (watermark {watermark}); run `update` instead")]
    IndexAlreadyInitialized { watermark: String },

    #[error("Commit {0} is already present in the index")]
    DuplicateCommit(String),

    #[error("Another process is writing to the index at {0}")]
    IndexBusy(String),

    #[error("Indexing of range {range} failed after {absorbed} commits; no update was recorded: {source}")]
    AbsorptionFailed {
        range: String,
        absorbed: usize,
        #[source]
        source: Box<RosettaError>,
    },

    #[error("Range {range} was recorded ({absorbed} commits) but scoring failed; the next run rescores: {source}")]
    ScoringFailed {
        range: String,
        absorbed: usize,
        #[source]
        source: Box<RosettaError>,
    },

    #[error("Storage error: {0}")]
    Storage(StoreError),

    #[error("Git error: {0}")]
    Git(#[from] GitError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Similarity error: {0}")]
    Similarity(#[from] SimilarityError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised by the SQLite index store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Commit {0} is already present")]
    DuplicateCommit(String),

    #[error("Failed to prepare index location '{path}': {reason}")]
    Location { path: String, reason: String },
}

/// Errors related to git operations
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Failed to open git repository: {0}")]
    OpenFailed(String),

    #[error("Failed to resolve HEAD: {0}")]
    HeadNotFound(String),

    #[error("Revision {0} is not part of the repository history")]
    UnknownRevision(String),

    #[error("Failed to iterate commits: {0}")]
    IterFailed(String),

    #[error("Failed to diff commit {commit}: {reason}")]
    DiffFailed { commit: String, reason: String },
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

/// Errors related to the similarity oracle
#[derive(Error, Debug)]
pub enum SimilarityError {
    #[error("Similarity backend unavailable: {0}")]
    Unavailable(String),

    #[error("Similarity call timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid similarity response: {0}")]
    InvalidResponse(String),

    #[error("Failed to initialize similarity backend: {0}")]
    InitializationFailed(String),
}

impl From<StoreError> for RosettaError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateCommit(rev) => RosettaError::DuplicateCommit(rev),
            other => RosettaError::Storage(other),
        }
    }
}

impl From<sqlx::Error> for RosettaError {
    fn from(err: sqlx::Error) -> Self {
        RosettaError::Storage(StoreError::Database(err))
    }
}

// Conversion from anyhow::Error to RosettaError
impl From<anyhow::Error> for RosettaError {
    fn from(err: anyhow::Error) -> Self {
        RosettaError::Other(format!("{:#}", err))
    }
}

impl RosettaError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        RosettaError::Other(msg.into())
    }

    /// Check if this is a caller error (wrong state or input) vs a system error
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            RosettaError::NotARepository(_)
                | RosettaError::IndexNotInitialized
                | RosettaError::IndexAlreadyInitialized { .. }
                | RosettaError::Config(ConfigError::InvalidValue { .. })
        )
    }

    /// Check if re-running the whole operation is safe and may succeed
    ///
    /// Storage failures are never retried in place; the caller re-runs
    /// `update()`, which restarts from the last recorded watermark.
    pub fn is_retryable(&self) -> bool {
        match self {
            RosettaError::IndexBusy(_) | RosettaError::Storage(_) | RosettaError::Io(_) => true,
            RosettaError::AbsorptionFailed { source, .. }
            | RosettaError::ScoringFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}
