/// Centralized platform-specific path computation
///
/// Indexes, lock files and the default config live under the platform data
/// and config directories (XDG on Linux, Application Support on macOS,
/// %LOCALAPPDATA% on Windows).
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

const FOLDER_NAME: &str = "rosetta-search";

/// Platform-agnostic path utilities
pub struct PlatformPaths;

impl PlatformPaths {
    /// Get the project-specific data directory
    ///
    /// Returns: {data_local_dir}/rosetta-search
    pub fn project_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(FOLDER_NAME)
    }

    /// Get the project-specific config directory
    ///
    /// Returns: {config_dir}/rosetta-search
    pub fn project_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(FOLDER_NAME)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::project_config_dir().join("config.toml")
    }

    /// Directory holding one SQLite index per repository
    pub fn default_index_dir() -> PathBuf {
        Self::project_data_dir().join("indexes")
    }

    /// Default index file for a repository root
    ///
    /// The file name is `<repo name>-<hash>.db`, where the hash is taken over
    /// the canonical repository path so two checkouts never share an index.
    pub fn default_index_path(repo_root: &Path) -> PathBuf {
        let stub = repo_root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "repo".to_string());
        let hash = short_hash(&repo_root.to_string_lossy());
        Self::default_index_dir().join(format!("{}-{}.db", stub, hash))
    }

    /// Default directory for single-writer lock files
    pub fn lock_dir() -> PathBuf {
        Self::project_data_dir().join("locks")
    }

    /// Lock file in `lock_dir` guarding writes to the given index
    pub fn lock_file_path(lock_dir: &Path, index_identity: &str) -> PathBuf {
        lock_dir.join(format!("{}.lock", short_hash(index_identity)))
    }
}

/// First 16 hex chars of the SHA-256 of `input`
pub(crate) fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    hash[..16].to_string()
}
