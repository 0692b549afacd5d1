use sqlx::SqlitePool;

/// Create the index schema if it does not exist yet
pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS commits (
            commit_id TEXT PRIMARY KEY,
            committed_at INTEGER NOT NULL,
            author TEXT NOT NULL,
            message TEXT NOT NULL,
            additions INTEGER NOT NULL DEFAULT 0,
            deletions INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tokens (
            token_id INTEGER PRIMARY KEY AUTOINCREMENT,
            token TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            file_id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tokens_files (
            token_id INTEGER NOT NULL,
            file_id INTEGER NOT NULL,
            term_frequency INTEGER NOT NULL DEFAULT 0,
            tf_idf_score REAL,
            UNIQUE(token_id, file_id),
            FOREIGN KEY (token_id) REFERENCES tokens(token_id),
            FOREIGN KEY (file_id) REFERENCES files(file_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS commits_files (
            commit_id TEXT NOT NULL,
            file_id INTEGER NOT NULL,
            additions INTEGER NOT NULL DEFAULT 0,
            deletions INTEGER NOT NULL DEFAULT 0,
            UNIQUE(commit_id, file_id),
            FOREIGN KEY (commit_id) REFERENCES commits(commit_id),
            FOREIGN KEY (file_id) REFERENCES files(file_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS updates (
            update_id INTEGER PRIMARY KEY AUTOINCREMENT,
            start_time INTEGER NOT NULL,
            end_time INTEGER NOT NULL,
            start_rev TEXT NOT NULL,
            end_rev TEXT NOT NULL,
            num_commits INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Latest ledger row whose commits are reflected in every stored score
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scoring_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            scored_through INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tokens_files_file ON tokens_files(file_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_updates_end_time ON updates(end_time)")
        .execute(pool)
        .await?;

    Ok(())
}
