//! Commit absorption: initial build and incremental update

use super::RosettaClient;
use super::fs_lock::FsLockGuard;
use crate::error::{Result, RosettaError};
use crate::git::{CommitInfo, GitWalker, RangeWalk, walker::range_label};
use crate::scoring;
use crate::types::IndexReport;
use chrono::Utc;
use std::time::Instant;

impl RosettaClient {
    /// Index the full history from HEAD down to the root commit
    ///
    /// Only valid before any run has completed. Commits left behind by an
    /// interrupted earlier build are skipped and reported as resumed.
    pub async fn build(&self) -> Result<IndexReport> {
        let _lock = self.acquire_writer_lock().await?;

        if let Some(watermark) = self.store.watermark().await? {
            return Err(RosettaError::IndexAlreadyInitialized { watermark });
        }

        tracing::info!("Building index for {}", self.repo_path.display());
        self.index_range(None).await
    }

    /// Absorb commits in `watermark..HEAD`
    ///
    /// A run that finds no new commits writes nothing and returns the
    /// unchanged watermark.
    pub async fn update(&self) -> Result<IndexReport> {
        let _lock = self.acquire_writer_lock().await?;

        let watermark = self
            .store
            .watermark()
            .await?
            .ok_or(RosettaError::IndexNotInitialized)?;

        tracing::info!(
            "Updating index for {} from {}",
            self.repo_path.display(),
            watermark
        );
        self.index_range(Some(watermark)).await
    }

    async fn acquire_writer_lock(&self) -> Result<FsLockGuard> {
        let lock_dir = self.lock_dir();
        let identity = self.lock_identity();
        let wait_secs = self.config.lock.wait_secs;
        tokio::task::spawn_blocking(move || FsLockGuard::acquire(&lock_dir, &identity, wait_secs))
            .await
            .map_err(|e| RosettaError::other(format!("Lock task failed: {}", e)))?
    }

    async fn walk(&self, since: Option<String>) -> Result<RangeWalk> {
        let repo_path = self.repo_path.clone();
        tokio::task::spawn_blocking(move || {
            let walker = GitWalker::discover(&repo_path)?;
            walker.walk(since.as_deref())
        })
        .await
        .map_err(|e| RosettaError::other(format!("Git walk task failed: {}", e)))?
    }

    async fn index_range(&self, since: Option<String>) -> Result<IndexReport> {
        let start_time = Utc::now();
        let timer = Instant::now();
        let range = range_label(since.as_deref());

        let walk = self.walk(since.clone()).await?;

        let mut absorbed = 0;
        let mut resumed = 0;
        for commit in &walk.commits {
            match self.absorb_commit(commit).await {
                Ok(true) => absorbed += 1,
                Ok(false) => resumed += 1,
                Err(e) => {
                    tracing::error!("Indexing {} failed at {}: {}", range, commit.hash, e);
                    return Err(RosettaError::AbsorptionFailed {
                        range,
                        absorbed: absorbed + resumed,
                        source: Box::new(e),
                    });
                }
            }

            let done = absorbed + resumed;
            if done % 100 == 0 {
                tracing::info!("Indexed {}/{} commits", done, walk.commits.len());
            }
        }

        let total = absorbed + resumed;
        let mut completed_at = None;

        if let Some(oldest) = walk.oldest() {
            let end_time = Utc::now();
            // Commits are stored but the watermark has not moved
            if let Err(e) = self
                .store
                .append_update_record(start_time, end_time, &oldest.hash, &walk.head, total)
                .await
            {
                tracing::error!("Recording {} in the update ledger failed: {}", range, e);
                return Err(RosettaError::AbsorptionFailed {
                    range,
                    absorbed: total,
                    source: Box::new(e.into()),
                });
            }
            completed_at = Some(end_time);
        } else {
            tracing::info!("No new commits in {}", range);
        }

        // Also repairs a scoring pass that failed after its ledger row was written
        let stale = match self.store.scores_stale().await {
            Ok(stale) => stale,
            Err(e) => return Err(scoring_failed(range, total, e.into())),
        };
        let scored_associations = if total > 0 || stale {
            match scoring::rescore_all(&self.store, self.config.scoring.batch_size).await {
                Ok(scored) => scored,
                Err(e) => {
                    tracing::error!("Scoring after {} failed: {}", range, e);
                    return Err(scoring_failed(range, total, e.into()));
                }
            }
        } else {
            0
        };

        let report = IndexReport {
            range,
            commits_indexed: total,
            resumed,
            watermark: self.store.watermark().await?,
            completed_at,
            scored_associations,
            duration_ms: timer.elapsed().as_millis() as u64,
        };

        tracing::info!(
            "Indexed {} commits ({} resumed) in {}ms",
            report.commits_indexed,
            report.resumed,
            report.duration_ms
        );

        Ok(report)
    }

    /// Absorb one commit in its own transaction
    ///
    /// Returns `false` when the commit was already stored by an interrupted
    /// run and was skipped.
    async fn absorb_commit(&self, commit: &CommitInfo) -> Result<bool> {
        if self.store.has_commit(&commit.hash).await? {
            tracing::warn!(
                "Commit {} already indexed by an unfinished run, skipping",
                commit.hash
            );
            return Ok(false);
        }

        let normalized = self.normalizer.normalize(&commit.message);
        tracing::debug!(
            "Absorbing {} ({} tokens, {} files)",
            commit.hash,
            normalized.tokens.len(),
            commit.files.len()
        );

        let mut batch = self.store.begin_commit().await?;
        batch.record_commit(commit, &normalized.joined).await?;
        batch
            .record_token_file_links(&commit.hash, &normalized.tokens, &commit.files)
            .await?;
        batch.finish().await?;

        Ok(true)
    }
}

fn scoring_failed(range: String, absorbed: usize, source: RosettaError) -> RosettaError {
    RosettaError::ScoringFailed {
        range,
        absorbed,
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests;
