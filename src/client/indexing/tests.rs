use super::*;
use crate::client::test_repo::TestRepo;
use crate::scoring::tf_idf;
use tempfile::TempDir;

async fn client_for(repo: &TestRepo, index_dir: &TempDir) -> RosettaClient {
    RosettaClient::open(repo.path(), repo.config(index_dir))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_build_records_full_history() {
    let repo = TestRepo::new();
    let first = repo.commit("fix bug", &[("a.rs", "a\n"), ("b.rs", "b\n")]);
    let head = repo.commit("fix crash", &[("b.rs", "bb\n"), ("c.rs", "c\n")]);
    let index_dir = TempDir::new().unwrap();
    let client = client_for(&repo, &index_dir).await;

    let report = client.build().await.unwrap();
    assert_eq!(report.range, "HEAD");
    assert_eq!(report.commits_indexed, 2);
    assert_eq!(report.resumed, 0);
    assert_eq!(report.watermark.as_deref(), Some(head.as_str()));
    assert!(report.completed_at.is_some());
    // fix x3 files, bug x2, crash x2
    assert_eq!(report.scored_associations, 7);

    let record = client.last_update().await.unwrap().unwrap();
    assert_eq!(record.first_rev, first);
    assert_eq!(record.last_rev, head);
    assert_eq!(record.commit_count, 2);
}

#[tokio::test]
async fn test_build_twice_is_rejected() {
    let repo = TestRepo::new();
    let head = repo.commit("initial import", &[("a.rs", "a\n")]);
    let index_dir = TempDir::new().unwrap();
    let client = client_for(&repo, &index_dir).await;

    client.build().await.unwrap();
    let err = client.build().await.unwrap_err();
    assert!(matches!(
        err,
        RosettaError::IndexAlreadyInitialized { ref watermark } if *watermark == head
    ));
}

#[tokio::test]
async fn test_update_before_build_is_rejected() {
    let repo = TestRepo::new();
    repo.commit("initial import", &[("a.rs", "a\n")]);
    let index_dir = TempDir::new().unwrap();
    let client = client_for(&repo, &index_dir).await;

    assert!(matches!(
        client.update().await,
        Err(RosettaError::IndexNotInitialized)
    ));
}

#[tokio::test]
async fn test_noop_update_writes_nothing() {
    let repo = TestRepo::new();
    let head = repo.commit("initial import", &[("a.rs", "a\n")]);
    let index_dir = TempDir::new().unwrap();
    let client = client_for(&repo, &index_dir).await;
    client.build().await.unwrap();
    let before = client.last_update().await.unwrap().unwrap();

    let report = client.update().await.unwrap();
    assert_eq!(report.commits_indexed, 0);
    assert!(report.completed_at.is_none());
    assert_eq!(report.watermark.as_deref(), Some(head.as_str()));
    assert_eq!(report.range, format!("{}..HEAD", head));

    let after = client.last_update().await.unwrap().unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_update_absorbs_only_new_commits() {
    let repo = TestRepo::new();
    let base = repo.commit("initial import", &[("a.rs", "a\n")]);
    let index_dir = TempDir::new().unwrap();
    let client = client_for(&repo, &index_dir).await;
    client.build().await.unwrap();

    let second = repo.commit("add lexer", &[("lexer.rs", "l\n")]);
    let third = repo.commit("fix lexer crash", &[("lexer.rs", "m\n")]);

    let report = client.update().await.unwrap();
    assert_eq!(report.commits_indexed, 2);
    assert_eq!(report.watermark.as_deref(), Some(third.as_str()));
    assert_eq!(report.range, format!("{}..HEAD", base));

    let record = client.last_update().await.unwrap().unwrap();
    assert_eq!(record.first_rev, second);
    assert_eq!(record.last_rev, third);
    assert_eq!(client.store.commit_count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_watermark_only_moves_forward() {
    let repo = TestRepo::new();
    repo.commit("initial import", &[("a.rs", "a\n")]);
    let index_dir = TempDir::new().unwrap();
    let client = client_for(&repo, &index_dir).await;
    client.build().await.unwrap();

    let mut previous = client.last_update().await.unwrap().unwrap();
    for i in 0..3 {
        let content = format!("{}\n", i);
        repo.commit(&format!("tweak module {}", i), &[("a.rs", content.as_str())]);
        client.update().await.unwrap();
        let current = client.last_update().await.unwrap().unwrap();
        assert!(current.end_time >= previous.end_time);
        assert!(current.update_id > previous.update_id);
        assert_ne!(current.last_rev, previous.last_rev);
        previous = current;
    }
}

#[tokio::test]
async fn test_interrupted_build_resumes() {
    let repo = TestRepo::new();
    repo.commit("fix bug", &[("a.rs", "a\n")]);
    repo.commit("fix crash", &[("b.rs", "b\n")]);
    let index_dir = TempDir::new().unwrap();
    let client = client_for(&repo, &index_dir).await;

    // Absorb the oldest commit without writing a ledger row
    let walk = client.walk(None).await.unwrap();
    assert!(client.absorb_commit(walk.oldest().unwrap()).await.unwrap());

    let report = client.build().await.unwrap();
    assert_eq!(report.resumed, 1);
    assert_eq!(report.commits_indexed, 2);
    assert_eq!(client.store.commit_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_held_lock_reports_busy() {
    let repo = TestRepo::new();
    repo.commit("initial import", &[("a.rs", "a\n")]);
    let index_dir = TempDir::new().unwrap();
    let client = client_for(&repo, &index_dir).await;

    let _held = FsLockGuard::try_acquire(&client.lock_dir(), &client.lock_identity())
        .unwrap()
        .unwrap();

    assert!(matches!(client.build().await, Err(RosettaError::IndexBusy(_))));
    assert!(client.store.is_empty().await.unwrap());
}

#[tokio::test]
async fn test_deleted_file_keeps_history() {
    let repo = TestRepo::new();
    repo.commit("add scratch notes", &[("notes.md", "n\n")]);
    std::fs::remove_file(repo.path().join("notes.md")).unwrap();
    let mut index = repo.repo.index().unwrap();
    index.remove_path(std::path::Path::new("notes.md")).unwrap();
    index.write().unwrap();
    repo.commit("remove obsolete notes", &[("keep.md", "k\n")]);

    let index_dir = TempDir::new().unwrap();
    let client = client_for(&repo, &index_dir).await;
    client.build().await.unwrap();

    // Deleted files keep their historical association
    let hits = client.basic_search("obsolet*").await.unwrap();
    let paths: Vec<&str> = hits.iter().map(|h| h.path.as_str()).collect();
    assert_eq!(paths, vec!["keep.md", "notes.md"]);
}

async fn score_of(client: &RosettaClient, path: &str, token: &str) -> Option<f64> {
    client
        .tokens_for_file(path)
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.token == token)
        .and_then(|t| t.tf_idf)
}

#[tokio::test]
async fn test_update_repairs_scores_left_stale_by_partial_pass() {
    let repo = TestRepo::new();
    repo.commit("fix parser", &[("a.rs", "a\n")]);
    let index_dir = TempDir::new().unwrap();
    let client = client_for(&repo, &index_dir).await;
    let built = client.build().await.unwrap();
    assert_eq!(score_of(&client, "a.rs", "fix").await, Some(tf_idf(1, 1, 1)));

    // Absorb and record a commit, then score only the rows it added
    repo.commit("fix lexer", &[("a.rs", "aa\n"), ("b.rs", "b\n")]);
    let walk = client.walk(built.watermark.clone()).await.unwrap();
    let commit = walk.oldest().unwrap();
    assert!(client.absorb_commit(commit).await.unwrap());
    let now = Utc::now();
    client
        .store
        .append_update_record(now, now, &commit.hash, &walk.head, 1)
        .await
        .unwrap();
    sqlx::query("UPDATE tokens_files SET tf_idf_score = 0.0 WHERE tf_idf_score IS NULL")
        .execute(&client.store.pool)
        .await
        .unwrap();
    assert_eq!(client.store.unscored_count().await.unwrap(), 0);
    assert_eq!(score_of(&client, "a.rs", "fix").await, Some(tf_idf(1, 1, 1)));

    let report = client.update().await.unwrap();
    assert_eq!(report.commits_indexed, 0);
    assert!(report.scored_associations > 0);

    let repaired = score_of(&client, "a.rs", "fix").await.unwrap();
    assert!((repaired - tf_idf(2, 2, 2)).abs() < 1e-9);
    assert!((repaired - (-1.1699250014423124)).abs() < 1e-9);
    assert!(!client.store.scores_stale().await.unwrap());
}

#[tokio::test]
async fn test_ledger_failure_reports_range_and_resumes() {
    let repo = TestRepo::new();
    repo.commit("fix bug", &[("a.rs", "a\n")]);
    repo.commit("fix crash", &[("b.rs", "b\n")]);
    let index_dir = TempDir::new().unwrap();
    let client = client_for(&repo, &index_dir).await;

    sqlx::query(
        "CREATE TRIGGER reject_updates BEFORE INSERT ON updates \
         BEGIN SELECT RAISE(ABORT, 'ledger unavailable'); END",
    )
    .execute(&client.store.pool)
    .await
    .unwrap();

    match client.build().await {
        Err(RosettaError::AbsorptionFailed {
            range, absorbed, ..
        }) => {
            assert_eq!(range, "HEAD");
            assert_eq!(absorbed, 2);
        }
        other => panic!("expected AbsorptionFailed, got {:?}", other),
    }
    assert!(client.last_update().await.unwrap().is_none());
    assert_eq!(client.store.commit_count().await.unwrap(), 2);

    sqlx::query("DROP TRIGGER reject_updates")
        .execute(&client.store.pool)
        .await
        .unwrap();

    let report = client.build().await.unwrap();
    assert_eq!(report.resumed, 2);
    assert_eq!(report.commits_indexed, 2);
    assert!(client.last_update().await.unwrap().is_some());
}

#[tokio::test]
async fn test_scoring_failure_keeps_ledger_and_rescores_next_run() {
    let repo = TestRepo::new();
    repo.commit("fix bug", &[("a.rs", "a\n")]);
    let head = repo.commit("fix crash", &[("b.rs", "b\n")]);
    let index_dir = TempDir::new().unwrap();
    let client = client_for(&repo, &index_dir).await;

    sqlx::query(
        "CREATE TRIGGER reject_scores BEFORE UPDATE OF tf_idf_score ON tokens_files \
         BEGIN SELECT RAISE(ABORT, 'scores unavailable'); END",
    )
    .execute(&client.store.pool)
    .await
    .unwrap();

    match client.build().await {
        Err(RosettaError::ScoringFailed {
            range, absorbed, ..
        }) => {
            assert_eq!(range, "HEAD");
            assert_eq!(absorbed, 2);
        }
        other => panic!("expected ScoringFailed, got {:?}", other),
    }
    let record = client.last_update().await.unwrap().unwrap();
    assert_eq!(record.last_rev, head);
    assert!(client.store.scores_stale().await.unwrap());

    sqlx::query("DROP TRIGGER reject_scores")
        .execute(&client.store.pool)
        .await
        .unwrap();

    let report = client.update().await.unwrap();
    assert_eq!(report.commits_indexed, 0);
    assert_eq!(report.scored_associations, 4);
    assert_eq!(client.store.unscored_count().await.unwrap(), 0);
    assert!(!client.store.scores_stale().await.unwrap());
}
