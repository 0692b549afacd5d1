use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed indexing run from the update ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    /// Ledger row id (insertion order)
    pub update_id: i64,
    /// When the run started
    pub start_time: DateTime<Utc>,
    /// When the run finished
    pub end_time: DateTime<Utc>,
    /// Oldest revision absorbed by the run
    pub first_rev: String,
    /// HEAD at the time of the run; the next update starts after it
    pub last_rev: String,
    /// Number of commits absorbed
    pub commit_count: usize,
}

/// Outcome of `create` or `update`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexReport {
    /// Revision range walked (`HEAD` or `<watermark>..HEAD`)
    pub range: String,
    /// Commits absorbed by this run, resumed ones included
    pub commits_indexed: usize,
    /// Commits already present from an interrupted run and skipped
    pub resumed: usize,
    /// Watermark after the run (unchanged when nothing was absorbed)
    pub watermark: Option<String>,
    /// Completion time, set only when an update record was written
    pub completed_at: Option<DateTime<Utc>>,
    /// Token-file associations rescored after the run
    pub scored_associations: usize,
    /// Time taken in milliseconds
    pub duration_ms: u64,
}

/// A file returned by lexical search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicSearchHit {
    /// Repository-relative path
    pub path: String,
    /// Vocabulary token that produced the best score
    pub token: String,
    /// Best TF-IDF score among matched tokens (unscored rows count as 0)
    pub score: f64,
}

/// A vocabulary token that contributed to a file's ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedToken {
    /// Normalized query token the match was expanded from
    pub query_token: String,
    /// Vocabulary token associated with the file
    pub token: String,
    /// Oracle similarity between the two (1.0 for an exact match)
    pub similarity: f32,
    /// TF-IDF of (token, file)
    pub tf_idf: f64,
}

/// A file returned by hybrid search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileResult {
    /// Repository-relative path
    pub path: String,
    /// Distinct query tokens with evidence for this file, sorted
    pub query_tokens: Vec<String>,
    /// Every (query token, vocabulary token) match for this file
    pub matched_tokens: Vec<MatchedToken>,
    /// Sum of `tf_idf` over `matched_tokens`
    pub tf_idf_sum: f64,
}

/// Response from hybrid search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Query as typed
    pub query: String,
    /// Query after normalization
    pub normalized_query: Vec<String>,
    /// Ranked files
    pub results: Vec<FileResult>,
    /// Oracle calls that failed or timed out and were scored 0
    pub degraded_pairs: usize,
    /// True when any oracle call degraded
    pub semantic_partial: bool,
    /// Time taken in milliseconds
    pub duration_ms: u64,
}

/// A token describing a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenScore {
    pub token: String,
    /// Commits in which the token co-occurred with the file
    pub term_frequency: i64,
    /// None until the scoring pass has run
    pub tf_idf: Option<f64>,
}

/// Summary of an index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
    /// Location of the SQLite index
    pub index_path: String,
    /// True once a build has completed
    pub initialized: bool,
    pub commits: i64,
    pub tokens: i64,
    pub files: i64,
    /// Revision the next update starts after
    pub watermark: Option<String>,
    /// Current HEAD of the repository
    pub head: String,
    /// True when the watermark is HEAD, i.e. `update` has nothing to absorb
    pub up_to_date: bool,
    pub last_update: Option<UpdateRecord>,
}
