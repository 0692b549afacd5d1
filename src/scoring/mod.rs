//! TF-IDF scoring of token-file associations
//!
//! ```text
//! tf    = commits in which the token co-occurred with the file
//! df    = files associated with the token
//! N     = files in the index
//! tfidf = tf * log2(N / (df + 1))
//! ```
//!
//! With the smoothed denominator a token attached to every file scores
//! slightly below zero.

use crate::error::StoreError;
use crate::store::{IndexStore, ScoreUpdate};

/// TF-IDF of one association
pub fn tf_idf(term_frequency: i64, document_frequency: i64, total_files: i64) -> f64 {
    if total_files <= 0 {
        return 0.0;
    }
    let idf = (total_files as f64 / (document_frequency as f64 + 1.0)).log2();
    term_frequency as f64 * idf
}

/// Recompute every association score, writing `batch_size` rows per
/// transaction. Returns the number of associations scored.
///
/// Only a pass that writes every chunk advances the scoring marker, so an
/// interrupted pass leaves the index stale for the next run to repair.
pub async fn rescore_all(store: &IndexStore, batch_size: usize) -> Result<usize, StoreError> {
    let through = store.last_update().await?.map(|u| u.update_id);
    let total_files = store.file_count().await?;
    let stats = store.association_stats().await?;

    tracing::info!(
        "Scoring {} associations over {} files",
        stats.len(),
        total_files
    );

    let updates: Vec<ScoreUpdate> = stats
        .iter()
        .map(|s| ScoreUpdate {
            token_id: s.token_id,
            file_id: s.file_id,
            score: tf_idf(s.term_frequency, s.document_frequency, total_files),
        })
        .collect();

    for chunk in updates.chunks(batch_size.max(1)) {
        store.set_scores(chunk).await?;
        tracing::debug!("Wrote {} scores", chunk.len());
    }

    if let Some(update_id) = through {
        store.mark_scored_through(update_id).await?;
    }

    Ok(updates.len())
}
