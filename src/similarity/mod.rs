//! Semantic similarity oracles
//!
//! A [`SimilarityOracle`] scores how close two normalized tokens are, in
//! `[0.0, 1.0]`. The query engine uses it to expand query terms into nearby
//! vocabulary terms. Backends are swappable through [`create_oracle`].

#[cfg(feature = "embeddings")]
mod embedding;
mod http;
mod lexical;

#[cfg(feature = "embeddings")]
pub use embedding::EmbeddingOracle;
pub use http::HttpOracle;
pub use lexical::LexicalOracle;

use crate::config::SimilarityConfig;
use crate::error::SimilarityError;
use async_trait::async_trait;
use std::sync::Arc;

/// Scores the semantic closeness of two tokens
#[async_trait]
pub trait SimilarityOracle: Send + Sync {
    /// Similarity of `a` and `b` in `[0.0, 1.0]`
    async fn similarity(&self, a: &str, b: &str) -> Result<f32, SimilarityError>;

    /// Prepare for a burst of calls over `vocabulary` (batch backends embed it
    /// once up front). The default does nothing.
    async fn warm_up(&self, _vocabulary: &[String]) -> Result<(), SimilarityError> {
        Ok(())
    }

    /// Backend name
    fn name(&self) -> &str;
}

/// Build the oracle selected by `config.backend`
pub fn create_oracle(
    config: &SimilarityConfig,
) -> Result<Arc<dyn SimilarityOracle>, SimilarityError> {
    tracing::debug!("Creating similarity oracle: {}", config.backend);
    match config.backend.as_str() {
        "lexical" => Ok(Arc::new(LexicalOracle::new())),
        "http" => Ok(Arc::new(HttpOracle::new(&config.url, config.timeout_ms)?)),
        #[cfg(feature = "embeddings")]
        "embedding" => Ok(Arc::new(EmbeddingOracle::new(&config.model_name)?)),
        #[cfg(not(feature = "embeddings"))]
        "embedding" => Err(SimilarityError::InitializationFailed(
            "built without the `embeddings` feature".to_string(),
        )),
        other => Err(SimilarityError::InitializationFailed(format!(
            "unknown similarity backend '{}'",
            other
        ))),
    }
}

/// Clamp a raw score into `[0.0, 1.0]`, rejecting NaN
pub(crate) fn clamp_score(score: f32) -> Result<f32, SimilarityError> {
    if score.is_nan() {
        return Err(SimilarityError::InvalidResponse(
            "similarity is NaN".to_string(),
        ));
    }
    Ok(score.clamp(0.0, 1.0))
}
