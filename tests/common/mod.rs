//! Shared fixtures for integration tests

#![allow(dead_code)]

use git2::{Repository, Signature};
use rosetta_search::{Config, RosettaClient};
use std::path::Path;
use tempfile::TempDir;

/// A scratch repository plus a separate directory for its index
pub struct Fixture {
    pub repo_dir: TempDir,
    pub index_dir: TempDir,
    pub repo: Repository,
}

impl Fixture {
    pub fn new() -> Self {
        let repo_dir = TempDir::new().unwrap();
        let index_dir = TempDir::new().unwrap();
        let repo = Repository::init(repo_dir.path()).unwrap();
        Self {
            repo_dir,
            index_dir,
            repo,
        }
    }

    pub fn path(&self) -> &Path {
        self.repo_dir.path()
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.index.path = Some(self.index_dir.path().join("index.db"));
        config.lock.dir = Some(self.index_dir.path().join("locks"));
        config
    }

    pub async fn client(&self) -> RosettaClient {
        RosettaClient::open(self.path(), self.config()).await.unwrap()
    }

    /// Write each `(path, content)` and commit them with `message`
    pub fn commit(&self, message: &str, files: &[(&str, &str)]) -> String {
        let mut index = self.repo.index().unwrap();
        for (rel, content) in files {
            let full = self.path().join(rel);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&full, content).unwrap();
            index.add_path(Path::new(rel)).unwrap();
        }
        index.write().unwrap();

        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("Integration Test", "it@example.com").unwrap();
        let parents = match self.repo.head() {
            Ok(head) => vec![head.peel_to_commit().unwrap()],
            Err(_) => vec![],
        };
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
            .to_string()
    }
}
