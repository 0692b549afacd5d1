use super::test_repo::TestRepo;
use super::*;
use tempfile::TempDir;

#[tokio::test]
async fn test_open_rejects_non_repository() {
    let dir = TempDir::new().unwrap();
    let index_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.index.path = Some(index_dir.path().join("index.db"));

    let result = RosettaClient::open(dir.path(), config).await;
    assert!(matches!(result, Err(RosettaError::NotARepository(_))));
}

#[tokio::test]
async fn test_open_rejects_invalid_config() {
    let repo = TestRepo::new();
    repo.commit("initial commit", &[("a.txt", "a\n")]);
    let index_dir = TempDir::new().unwrap();
    let mut config = repo.config(&index_dir);
    config.search.limit = 0;

    assert!(RosettaClient::open(repo.path(), config).await.is_err());
}

#[tokio::test]
async fn test_open_from_subdirectory_finds_root() {
    let repo = TestRepo::new();
    repo.commit("add module", &[("src/deep/mod.rs", "x\n")]);
    let index_dir = TempDir::new().unwrap();

    let client = RosettaClient::open(repo.path().join("src/deep"), repo.config(&index_dir))
        .await
        .unwrap();
    assert_eq!(
        client.repo_path(),
        std::fs::canonicalize(repo.path()).unwrap()
    );
    assert_eq!(client.index_path(), index_dir.path().join("index.db"));
}

#[tokio::test]
async fn test_queries_require_initialized_index() {
    let repo = TestRepo::new();
    repo.commit("initial commit", &[("a.txt", "a\n")]);
    let index_dir = TempDir::new().unwrap();
    let client = RosettaClient::open(repo.path(), repo.config(&index_dir))
        .await
        .unwrap();

    assert!(matches!(
        client.basic_search("initial").await,
        Err(RosettaError::IndexNotInitialized)
    ));
    assert!(matches!(
        client.similarity_search("initial", None, None).await,
        Err(RosettaError::IndexNotInitialized)
    ));
    assert!(matches!(
        client.tokens_for_file("a.txt").await,
        Err(RosettaError::IndexNotInitialized)
    ));
}

#[tokio::test]
async fn test_status_before_and_after_build() {
    let repo = TestRepo::new();
    repo.commit("add parser", &[("parser.rs", "p\n")]);
    let head = repo.commit("fix parser crash", &[("parser.rs", "q\n")]);
    let index_dir = TempDir::new().unwrap();
    let client = RosettaClient::open(repo.path(), repo.config(&index_dir))
        .await
        .unwrap();

    let before = client.status().await.unwrap();
    assert!(!before.initialized);
    assert_eq!(before.commits, 0);
    assert!(before.watermark.is_none());
    assert_eq!(before.head, head);
    assert!(!before.up_to_date);

    client.build().await.unwrap();

    let after = client.status().await.unwrap();
    assert!(after.initialized);
    assert_eq!(after.commits, 2);
    assert_eq!(after.files, 1);
    assert_eq!(after.watermark.as_deref(), Some(head.as_str()));
    assert_eq!(after.last_update.unwrap().commit_count, 2);
    assert!(after.up_to_date);

    let next = repo.commit("fix lexer", &[("lexer.rs", "l\n")]);
    let behind = client.status().await.unwrap();
    assert_eq!(behind.head, next);
    assert_eq!(behind.watermark.as_deref(), Some(head.as_str()));
    assert!(!behind.up_to_date);
}

#[tokio::test]
async fn test_tokens_for_file() {
    let repo = TestRepo::new();
    repo.commit("add parser", &[("parser.rs", "p\n"), ("lexer.rs", "l\n")]);
    repo.commit("fix parser crash", &[("parser.rs", "q\n")]);
    let index_dir = TempDir::new().unwrap();
    let client = RosettaClient::open(repo.path(), repo.config(&index_dir))
        .await
        .unwrap();
    client.build().await.unwrap();

    let tokens = client.tokens_for_file("parser.rs").await.unwrap();
    let names: Vec<&str> = tokens.iter().map(|t| t.token.as_str()).collect();
    assert!(names.contains(&"crash"));
    assert!(names.contains(&"parser"));
    assert!(tokens.iter().all(|t| t.tf_idf.is_some()));

    let parser = tokens.iter().find(|t| t.token == "parser").unwrap();
    assert_eq!(parser.term_frequency, 2);

    assert!(client.tokens_for_file("missing.rs").await.unwrap().is_empty());
}
