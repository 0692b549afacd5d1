use crate::error::{GitError, RosettaError};
use git2::{DiffOptions, Oid, Repository, Sort};
use std::path::{Path, PathBuf};

/// A file touched by a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Repository-relative path
    pub path: String,
    /// Lines added in this file
    pub additions: usize,
    /// Lines removed from this file
    pub deletions: usize,
}

/// Information about a git commit
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// Full commit SHA hash (40 characters)
    pub hash: String,
    /// Raw commit message (subject and body)
    pub message: String,
    /// Author's name
    pub author_name: String,
    /// Commit timestamp (Unix epoch seconds)
    pub commit_date: i64,
    /// Files changed relative to the first parent
    pub files: Vec<FileChange>,
    /// Total lines added
    pub additions: usize,
    /// Total lines removed
    pub deletions: usize,
}

/// Result of walking a revision range
#[derive(Debug, Clone)]
pub struct RangeWalk {
    /// HEAD at the time of the walk
    pub head: String,
    /// Commits in the range, newest first
    pub commits: Vec<CommitInfo>,
}

impl RangeWalk {
    /// Oldest commit in the walk, i.e. the last one yielded
    pub fn oldest(&self) -> Option<&CommitInfo> {
        self.commits.last()
    }
}

/// Git repository walker for extracting commit information
pub struct GitWalker {
    repo: Repository,
    repo_path: PathBuf,
}

impl GitWalker {
    /// Discover and open a git repository from any path within it
    ///
    /// Fails with [`RosettaError::NotARepository`] when no repository is found
    /// or the repository has no commits yet.
    pub fn discover<P: AsRef<Path>>(path: P) -> Result<Self, RosettaError> {
        let path = path.as_ref();
        let not_a_repo = || RosettaError::NotARepository(path.display().to_string());

        let repo = Repository::discover(path).map_err(|e| {
            tracing::debug!("Repository discovery failed for {}: {}", path.display(), e);
            not_a_repo()
        })?;

        if repo.is_bare() {
            return Err(not_a_repo());
        }

        let repo_path = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(not_a_repo)?;

        if repo.head().is_err() {
            tracing::debug!("Repository at {} has no commits", repo_path.display());
            return Err(not_a_repo());
        }

        tracing::info!("Opened git repository at: {}", repo_path.display());

        Ok(Self { repo, repo_path })
    }

    /// Get the repository root path
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Revision id of the current HEAD commit
    pub fn head(&self) -> Result<String, RosettaError> {
        Ok(self.head_oid()?.to_string())
    }

    fn head_oid(&self) -> Result<Oid, GitError> {
        let head = self
            .repo
            .head()
            .map_err(|e| GitError::HeadNotFound(e.to_string()))?;
        let commit = head
            .peel_to_commit()
            .map_err(|e| GitError::HeadNotFound(e.to_string()))?;
        Ok(commit.id())
    }

    /// Enumerate commits reachable from HEAD, newest first
    ///
    /// With `since`, commits reachable from that revision are excluded
    /// (`since..HEAD`). Without it the full history down to the root commit is
    /// returned.
    pub fn walk(&self, since: Option<&str>) -> Result<RangeWalk, RosettaError> {
        let head = self.head_oid()?;

        let mut revwalk = self
            .repo
            .revwalk()
            .map_err(|e| GitError::IterFailed(e.to_string()))?;
        revwalk
            .set_sorting(Sort::TIME | Sort::TOPOLOGICAL)
            .map_err(|e| GitError::IterFailed(e.to_string()))?;
        revwalk
            .push(head)
            .map_err(|e| GitError::IterFailed(e.to_string()))?;

        if let Some(rev) = since {
            let since_oid = self
                .repo
                .revparse_single(rev)
                .and_then(|obj| obj.peel_to_commit())
                .map_err(|_| GitError::UnknownRevision(rev.to_string()))?
                .id();
            revwalk
                .hide(since_oid)
                .map_err(|e| GitError::IterFailed(e.to_string()))?;
        }

        let mut commits = Vec::new();
        for oid in revwalk {
            let oid = oid.map_err(|e| GitError::IterFailed(e.to_string()))?;
            let commit = self
                .repo
                .find_commit(oid)
                .map_err(|e| GitError::IterFailed(e.to_string()))?;

            commits.push(self.extract_commit_info(&commit)?);

            if commits.len() % 100 == 0 {
                tracing::debug!("Walked {} commits", commits.len());
            }
        }

        tracing::info!(
            "Walked {} commits in range {}",
            commits.len(),
            range_label(since)
        );

        Ok(RangeWalk {
            head: head.to_string(),
            commits,
        })
    }

    /// Extract detailed information from a commit
    fn extract_commit_info(&self, commit: &git2::Commit) -> Result<CommitInfo, GitError> {
        let hash = commit.id().to_string();
        let message = commit.message().unwrap_or("").to_string();
        let author = commit.author();
        let author_name = author.name().unwrap_or("Unknown").to_string();
        let commit_date = commit.time().seconds();

        let files = self.extract_file_changes(commit)?;
        let additions = files.iter().map(|f| f.additions).sum();
        let deletions = files.iter().map(|f| f.deletions).sum();

        Ok(CommitInfo {
            hash,
            message,
            author_name,
            commit_date,
            files,
            additions,
            deletions,
        })
    }

    /// Diff against the first parent (or the empty tree for a root commit)
    fn extract_file_changes(&self, commit: &git2::Commit) -> Result<Vec<FileChange>, GitError> {
        let diff_err = |e: git2::Error| GitError::DiffFailed {
            commit: commit.id().to_string(),
            reason: e.to_string(),
        };

        let tree = commit.tree().map_err(diff_err)?;
        let parent_tree = if commit.parent_count() > 0 {
            Some(commit.parent(0).and_then(|p| p.tree()).map_err(diff_err)?)
        } else {
            None
        };

        let mut diff_opts = DiffOptions::new();
        diff_opts.context_lines(0).ignore_whitespace(false);

        let diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut diff_opts))
            .map_err(diff_err)?;

        let mut files = Vec::with_capacity(diff.deltas().len());
        for (idx, delta) in diff.deltas().enumerate() {
            // Deletions only carry the old side
            let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) else {
                continue;
            };

            let (additions, deletions) = match git2::Patch::from_diff(&diff, idx).map_err(diff_err)? {
                Some(patch) => {
                    let (_, additions, deletions) = patch.line_stats().map_err(diff_err)?;
                    (additions, deletions)
                }
                None => (0, 0),
            };

            files.push(FileChange {
                path: path.to_string_lossy().replace('\\', "/"),
                additions,
                deletions,
            });
        }

        Ok(files)
    }
}

/// Human-readable label for a walked range
pub fn range_label(since: Option<&str>) -> String {
    match since {
        Some(rev) => format!("{}..HEAD", rev),
        None => "HEAD".to_string(),
    }
}
