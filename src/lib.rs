//! # Rosetta Search - find files by the history that shaped them
//!
//! Indexes the commit messages of a git repository into an inverted index
//! (commit → token → file) and ranks files for a query using TF-IDF plus
//! semantic expansion of query terms.
//!
//! ## Key Features
//!
//! - **Incremental Indexing**: an append-only update ledger lets `update`
//!   absorb only `watermark..HEAD`
//! - **TF-IDF Scoring**: per (token, file) association, recomputed after every
//!   run that absorbs commits
//! - **Hybrid Search**: query tokens are expanded to nearby vocabulary terms
//!   through a pluggable similarity oracle (edit distance, HTTP service or a
//!   local embedding model)
//! - **Graceful Degradation**: oracle failures and timeouts score 0 and are
//!   reported, never raised
//!
//! ## Architecture
//!
//! ```text
//!   git history ──► GitWalker ──► EnglishNormalizer ──► IndexStore (SQLite)
//!                                                          │
//!                                             scoring::rescore_all
//!                                                          │
//!   query ──► EnglishNormalizer ──► SimilarityOracle ──► QueryEngine ──► ranked files
//! ```
//!
//! ## Modules
//!
//! - [`client`]: [`RosettaClient`], the library entry point
//! - [`store`]: SQLite schema and queries
//! - [`scoring`]: TF-IDF computation
//! - [`search`]: lexical and hybrid query resolution
//! - [`similarity`]: similarity oracle trait and backends
//! - [`nlp`]: commit message normalization
//! - [`git`]: commit enumeration
//! - [`config`]: configuration with environment variable overrides
//! - [`error`]: error types and result alias
//!
//! ## Usage Example
//!
//! ```no_run
//! use rosetta_search::{Config, RosettaClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = RosettaClient::open("/path/to/repo", Config::load(None)?).await?;
//!     if client.last_update().await?.is_none() {
//!         client.build().await?;
//!     } else {
//!         client.update().await?;
//!     }
//!
//!     let response = client.similarity_search("parser crash", None, Some(5)).await?;
//!     for file in &response.results {
//!         println!("{} ({:.3})", file.path, file.tf_idf_sum);
//!     }
//!     Ok(())
//! }
//! ```

/// Library client wiring store, normalizer and oracle together
pub mod client;

/// Configuration management with environment variable overrides
pub mod config;

/// Error types and utilities
pub mod error;

/// Git repository walking and commit extraction
pub mod git;

/// Commit message normalization
pub mod nlp;

/// Platform-specific locations for indexes, locks and config
pub mod paths;

/// TF-IDF scoring pass
pub mod scoring;

/// Query resolution and ranking
pub mod search;

/// Semantic similarity oracles
pub mod similarity;

/// SQLite index store
pub mod store;

/// Request/response types
pub mod types;

pub use client::RosettaClient;
pub use config::Config;
pub use error::{Result, RosettaError};
pub use types::*;
