//! SQLite index store
//!
//! Holds commits, tokens, files, their associations with TF-IDF scores, and
//! the append-only update ledger. Writes for one commit go through a
//! [`CommitBatch`] so a commit is either fully absorbed or not at all.

pub mod schema;

use crate::error::StoreError;
use crate::git::{CommitInfo, FileChange};
use crate::types::{TokenScore, UpdateRecord};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Row, Sqlite, Transaction};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

type StoreResult<T> = Result<T, StoreError>;

/// One (token, file) row as seen by lexical lookup
#[derive(Debug, Clone, PartialEq)]
pub struct TokenFileMatch {
    pub token: String,
    pub path: String,
    /// TF-IDF, 0.0 when the row has not been scored yet
    pub tf_idf: f64,
}

/// Inputs of the TF-IDF formula for one association
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssociationStats {
    pub token_id: i64,
    pub file_id: i64,
    pub term_frequency: i64,
    /// Number of files the token is associated with
    pub document_frequency: i64,
}

/// A computed score to write back
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreUpdate {
    pub token_id: i64,
    pub file_id: i64,
    pub score: f64,
}

/// Handle to one index database
#[derive(Clone)]
pub struct IndexStore {
    pub(crate) pool: SqlitePool,
    path: PathBuf,
}

impl IndexStore {
    /// Open (creating if needed) the index at `path` and ensure the schema
    pub async fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Location {
                path: parent.display().to_string(),
                reason: e.to_string(),
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        schema::migrate(&pool).await?;
        tracing::debug!("Opened index store at {}", path.display());

        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when no commit has been recorded yet
    pub async fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.commit_count().await? == 0)
    }

    pub async fn has_commit(&self, commit_id: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT 1 FROM commits WHERE commit_id = ?")
            .bind(commit_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn commit_count(&self) -> StoreResult<i64> {
        self.count("SELECT COUNT(*) FROM commits").await
    }

    pub async fn vocabulary_size(&self) -> StoreResult<i64> {
        self.count("SELECT COUNT(*) FROM tokens").await
    }

    pub async fn file_count(&self) -> StoreResult<i64> {
        self.count("SELECT COUNT(*) FROM files").await
    }

    pub async fn association_count(&self) -> StoreResult<i64> {
        self.count("SELECT COUNT(*) FROM tokens_files").await
    }

    /// Associations the scoring pass has not reached yet
    pub async fn unscored_count(&self) -> StoreResult<i64> {
        self.count("SELECT COUNT(*) FROM tokens_files WHERE tf_idf_score IS NULL")
            .await
    }

    /// Ledger row the last complete scoring pass covered
    pub async fn scored_through(&self) -> StoreResult<Option<i64>> {
        let id: Option<i64> =
            sqlx::query_scalar("SELECT scored_through FROM scoring_state WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(id)
    }

    /// Record that every score reflects the ledger up to `update_id`
    pub async fn mark_scored_through(&self, update_id: i64) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO scoring_state (id, scored_through) VALUES (1, ?)
            ON CONFLICT(id) DO UPDATE SET scored_through = excluded.scored_through
            "#,
        )
        .bind(update_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// True when stored scores may not match the current associations
    ///
    /// Either some rows were never scored, or a ledger row was written after
    /// the last complete scoring pass.
    pub async fn scores_stale(&self) -> StoreResult<bool> {
        if self.unscored_count().await? > 0 {
            return Ok(true);
        }
        let latest = self.last_update().await?.map(|u| u.update_id);
        Ok(latest.is_some() && latest > self.scored_through().await?)
    }

    async fn count(&self, sql: &str) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Start a transaction for absorbing one commit
    pub async fn begin_commit(&self) -> StoreResult<CommitBatch> {
        let tx = self.pool.begin().await?;
        Ok(CommitBatch { tx })
    }

    /// Append a row to the update ledger
    pub async fn append_update_record(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        first_rev: &str,
        last_rev: &str,
        commit_count: usize,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO updates (start_time, end_time, start_rev, end_rev, num_commits)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(start_time.timestamp_millis())
        .bind(end_time.timestamp_millis())
        .bind(first_rev)
        .bind(last_rev)
        .bind(commit_count as i64)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            "Recorded update {}..{} ({} commits)",
            first_rev,
            last_rev,
            commit_count
        );
        Ok(())
    }

    /// Most recently completed update, by end time then insertion order
    pub async fn last_update(&self) -> StoreResult<Option<UpdateRecord>> {
        let row = sqlx::query(
            r#"
            SELECT update_id, start_time, end_time, start_rev, end_rev, num_commits
            FROM updates
            ORDER BY end_time DESC, update_id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let start_ms: i64 = row.get("start_time");
            let end_ms: i64 = row.get("end_time");
            let num_commits: i64 = row.get("num_commits");
            UpdateRecord {
                update_id: row.get("update_id"),
                start_time: from_millis(start_ms),
                end_time: from_millis(end_ms),
                first_rev: row.get("start_rev"),
                last_rev: row.get("end_rev"),
                commit_count: num_commits.max(0) as usize,
            }
        }))
    }

    /// Revision the next incremental update starts after
    pub async fn watermark(&self) -> StoreResult<Option<String>> {
        Ok(self.last_update().await?.map(|u| u.last_rev))
    }

    /// Files associated with every token matching a wildcard pattern
    ///
    /// `*` matches any run of characters and `?` a single character; matching
    /// is case-insensitive for ASCII. Rows come back ordered by token id then
    /// path.
    pub async fn files_for_token(&self, pattern: &str) -> StoreResult<Vec<TokenFileMatch>> {
        let rows = sqlx::query(
            r#"
            SELECT t.token, f.path, tf.tf_idf_score
            FROM tokens t
            JOIN tokens_files tf ON tf.token_id = t.token_id
            JOIN files f ON f.file_id = tf.file_id
            WHERE t.token LIKE ? ESCAPE '\'
            ORDER BY t.token_id, f.path
            "#,
        )
        .bind(glob_to_like(pattern))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let score: Option<f64> = row.get("tf_idf_score");
                TokenFileMatch {
                    token: row.get("token"),
                    path: row.get("path"),
                    tf_idf: score.unwrap_or(0.0),
                }
            })
            .collect())
    }

    /// `(path, tfidf)` for every file associated with a token id
    pub async fn files_for_token_id(&self, token_id: i64) -> StoreResult<Vec<(String, f64)>> {
        let rows = sqlx::query(
            r#"
            SELECT f.path, tf.tf_idf_score
            FROM tokens_files tf
            JOIN files f ON f.file_id = tf.file_id
            WHERE tf.token_id = ?
            ORDER BY f.path
            "#,
        )
        .bind(token_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let score: Option<f64> = row.get("tf_idf_score");
                (row.get("path"), score.unwrap_or(0.0))
            })
            .collect())
    }

    /// Vocabulary describing a file, best scored first
    pub async fn tokens_for_file(&self, path: &str) -> StoreResult<Vec<TokenScore>> {
        let rows = sqlx::query(
            r#"
            SELECT t.token, tf.term_frequency, tf.tf_idf_score
            FROM files f
            JOIN tokens_files tf ON tf.file_id = f.file_id
            JOIN tokens t ON t.token_id = tf.token_id
            WHERE f.path = ?
            ORDER BY COALESCE(tf.tf_idf_score, 0.0) DESC, t.token ASC
            "#,
        )
        .bind(path)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| TokenScore {
                token: row.get("token"),
                term_frequency: row.get("term_frequency"),
                tf_idf: row.get("tf_idf_score"),
            })
            .collect())
    }

    /// The whole vocabulary in insertion order
    pub async fn all_tokens(&self) -> StoreResult<Vec<(i64, String)>> {
        let rows = sqlx::query("SELECT token_id, token FROM tokens ORDER BY token_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| (row.get("token_id"), row.get("token")))
            .collect())
    }

    /// Term and document frequency for every association
    pub async fn association_stats(&self) -> StoreResult<Vec<AssociationStats>> {
        let rows = sqlx::query(
            r#"
            SELECT tf.token_id, tf.file_id, tf.term_frequency, df.document_frequency
            FROM tokens_files tf
            JOIN (
                SELECT token_id, COUNT(*) AS document_frequency
                FROM tokens_files
                GROUP BY token_id
            ) df ON df.token_id = tf.token_id
            ORDER BY tf.token_id, tf.file_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| AssociationStats {
                token_id: row.get("token_id"),
                file_id: row.get("file_id"),
                term_frequency: row.get("term_frequency"),
                document_frequency: row.get("document_frequency"),
            })
            .collect())
    }

    /// Write one chunk of scores in a single transaction
    pub async fn set_scores(&self, scores: &[ScoreUpdate]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for update in scores {
            sqlx::query(
                "UPDATE tokens_files SET tf_idf_score = ? WHERE token_id = ? AND file_id = ?",
            )
            .bind(update.score)
            .bind(update.token_id)
            .bind(update.file_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Writes for a single commit, applied atomically by [`CommitBatch::finish`]
///
/// Dropping the batch without finishing rolls everything back.
pub struct CommitBatch {
    tx: Transaction<'static, Sqlite>,
}

impl CommitBatch {
    /// Insert the commit row; fails with `DuplicateCommit` if already present
    pub async fn record_commit(
        &mut self,
        commit: &CommitInfo,
        normalized_message: &str,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO commits (commit_id, committed_at, author, message, additions, deletions)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&commit.hash)
        .bind(commit.commit_date)
        .bind(&commit.author_name)
        .bind(normalized_message)
        .bind(commit.additions as i64)
        .bind(commit.deletions as i64)
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::DuplicateCommit(commit.hash.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Link every distinct token to every changed file
    ///
    /// Each (token, file) pair gets its term frequency bumped by one for this
    /// commit, and one commit-file row is written per changed file.
    pub async fn record_token_file_links(
        &mut self,
        commit_id: &str,
        tokens: &[String],
        files: &[FileChange],
    ) -> StoreResult<()> {
        let mut file_ids = Vec::with_capacity(files.len());
        let mut seen_files = HashSet::new();
        for file in files {
            if !seen_files.insert(file.path.as_str()) {
                continue;
            }
            let file_id = self.upsert_file(&file.path).await?;
            sqlx::query(
                r#"
                INSERT INTO commits_files (commit_id, file_id, additions, deletions)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(commit_id, file_id) DO NOTHING
                "#,
            )
            .bind(commit_id)
            .bind(file_id)
            .bind(file.additions as i64)
            .bind(file.deletions as i64)
            .execute(&mut *self.tx)
            .await?;
            file_ids.push(file_id);
        }

        let mut seen_tokens = HashSet::new();
        for token in tokens {
            if !seen_tokens.insert(token.as_str()) {
                continue;
            }
            let token_id = self.upsert_token(token).await?;
            for &file_id in &file_ids {
                sqlx::query(
                    r#"
                    INSERT INTO tokens_files (token_id, file_id, term_frequency)
                    VALUES (?, ?, 1)
                    ON CONFLICT(token_id, file_id) DO UPDATE SET
                        term_frequency = term_frequency + 1
                    "#,
                )
                .bind(token_id)
                .bind(file_id)
                .execute(&mut *self.tx)
                .await?;
            }
        }

        Ok(())
    }

    async fn upsert_token(&mut self, token: &str) -> StoreResult<i64> {
        sqlx::query("INSERT INTO tokens (token) VALUES (?) ON CONFLICT(token) DO NOTHING")
            .bind(token)
            .execute(&mut *self.tx)
            .await?;
        let id: i64 = sqlx::query_scalar("SELECT token_id FROM tokens WHERE token = ?")
            .bind(token)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(id)
    }

    async fn upsert_file(&mut self, path: &str) -> StoreResult<i64> {
        sqlx::query("INSERT INTO files (path) VALUES (?) ON CONFLICT(path) DO NOTHING")
            .bind(path)
            .execute(&mut *self.tx)
            .await?;
        let id: i64 = sqlx::query_scalar("SELECT file_id FROM files WHERE path = ?")
            .bind(path)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(id)
    }

    /// Commit the transaction
    pub async fn finish(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Translate a `*`/`?` wildcard pattern into a `LIKE` pattern escaped with `\`
pub(crate) fn glob_to_like(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '*' => out.push('%'),
            '?' => out.push('_'),
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
