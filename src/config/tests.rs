use super::*;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.similarity.backend, "lexical");
    assert_eq!(config.similarity.concurrency, 16);
    assert_eq!(config.search.similar_tokens, 10);
    assert_eq!(config.search.limit, 20);
    assert_eq!(config.scoring.batch_size, 500);
    assert_eq!(config.lock.wait_secs, 0);
    assert!(config.index.path.is_none());
}

#[test]
fn test_validate_valid_config() {
    let config = Config::default();
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_unknown_backend() {
    let mut config = Config::default();
    config.similarity.backend = "oracle-of-delphi".to_string();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("similarity.backend"));
}

#[test]
fn test_validate_zero_concurrency() {
    let mut config = Config::default();
    config.similarity.concurrency = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_zero_limit() {
    let mut config = Config::default();
    config.search.limit = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_min_similarity_range() {
    let mut config = Config::default();
    config.search.min_similarity = 1.5;
    assert!(config.validate().is_err());

    config.search.min_similarity = 0.4;
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_zero_scoring_batch() {
    let mut config = Config::default();
    config.scoring.batch_size = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_from_file_partial_sections_use_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[similarity]
backend = "http"
url = "http://localhost:9000/sim"

[search]
limit = 5
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.similarity.backend, "http");
    assert_eq!(config.similarity.url, "http://localhost:9000/sim");
    assert_eq!(config.similarity.timeout_ms, 2_000);
    assert_eq!(config.search.limit, 5);
    assert_eq!(config.search.similar_tokens, 10);
    assert_eq!(config.scoring.batch_size, 500);
}

#[test]
fn test_from_file_missing() {
    let result = Config::from_file(Path::new("/nonexistent/rosetta/config.toml"));
    assert!(matches!(
        result,
        Err(RosettaError::Config(ConfigError::FileNotFound(_)))
    ));
}

#[test]
fn test_from_file_invalid_toml() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[search\nlimit = ").unwrap();
    let result = Config::from_file(file.path());
    assert!(matches!(
        result,
        Err(RosettaError::Config(ConfigError::ParseFailed(_)))
    ));
}

#[test]
fn test_from_file_rejects_invalid_values() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[scoring]\nbatch_size = 0").unwrap();
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn test_index_path_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[index]\npath = \"/tmp/custom.db\"").unwrap();
    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.index.path, Some(PathBuf::from("/tmp/custom.db")));
}

#[test]
fn test_validate_zero_warm_up_timeout() {
    let mut config = Config::default();
    assert_eq!(config.similarity.warm_up_timeout_ms, 30_000);
    config.similarity.warm_up_timeout_ms = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_lock_dir_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[lock]\nwait_secs = 5\ndir = \"/tmp/rosetta-locks\"").unwrap();
    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.lock.wait_secs, 5);
    assert_eq!(config.lock.dir, Some(PathBuf::from("/tmp/rosetta-locks")));
    assert!(Config::default().lock.dir.is_none());
}
