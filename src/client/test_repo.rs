//! Scratch git repositories for client tests

use crate::config::Config;
use git2::{Repository, Signature};
use std::path::Path;
use tempfile::TempDir;

pub(crate) struct TestRepo {
    pub dir: TempDir,
    pub repo: Repository,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write each `(path, content)` and commit them with `message`
    pub fn commit(&self, message: &str, files: &[(&str, &str)]) -> String {
        let mut index = self.repo.index().unwrap();
        for (rel, content) in files {
            let full = self.dir.path().join(rel);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&full, content).unwrap();
            index.add_path(Path::new(rel)).unwrap();
        }
        index.write().unwrap();

        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("Test Author", "test@example.com").unwrap();
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

    /// Config with the index and its lock kept inside a separate scratch directory
    pub fn config(&self, index_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.index.path = Some(index_dir.path().join("index.db"));
        config.lock.dir = Some(index_dir.path().join("locks"));
        config
    }
}
