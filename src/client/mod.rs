//! Core library client for rosetta-search
//!
//! [`RosettaClient`] ties a repository to its index: it owns the store, the
//! normalizer shared by indexing and querying, and the similarity oracle.

pub(crate) mod fs_lock;
pub(crate) mod indexing;

use crate::config::Config;
use crate::error::{Result, RosettaError};
use crate::git::GitWalker;
use crate::nlp::{EnglishNormalizer, TokenNormalizer};
use crate::paths::PlatformPaths;
use crate::search::{QueryEngine, SearchSettings};
use crate::similarity::{self, SimilarityOracle};
use crate::store::IndexStore;
use crate::types::{BasicSearchHit, IndexStatus, SearchResponse, TokenScore, UpdateRecord};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Main client for indexing and searching one repository
///
/// # Example
///
/// ```no_run
/// use rosetta_search::{Config, RosettaClient};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = RosettaClient::open(".", Config::default()).await?;
///     client.build().await?;
///
///     let response = client.similarity_search("fix parser crash", None, None).await?;
///     for file in response.results {
///         println!("{}", file.path);
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct RosettaClient {
    pub(crate) repo_path: PathBuf,
    pub(crate) store: IndexStore,
    pub(crate) normalizer: Arc<dyn TokenNormalizer>,
    pub(crate) oracle: Arc<dyn SimilarityOracle>,
    pub(crate) config: Arc<Config>,
}

impl RosettaClient {
    /// Open the index for the repository containing `repo`
    ///
    /// The index lives at `config.index.path` when set, otherwise under the
    /// platform data directory keyed by the repository root.
    ///
    /// # Errors
    ///
    /// - [`RosettaError::NotARepository`] when `repo` has no usable git history
    /// - storage errors if the index cannot be created or opened
    /// - similarity errors if the configured oracle cannot be constructed
    pub async fn open(repo: impl AsRef<Path>, config: Config) -> Result<Self> {
        config.validate()?;

        let repo = repo.as_ref().to_path_buf();
        let repo_path = tokio::task::spawn_blocking(move || {
            GitWalker::discover(&repo).map(|w| w.repo_path().to_path_buf())
        })
        .await
        .map_err(|e| RosettaError::other(format!("Repository discovery task failed: {}", e)))??;

        let repo_path = std::fs::canonicalize(&repo_path).unwrap_or(repo_path);

        let index_path = config
            .index
            .path
            .clone()
            .unwrap_or_else(|| PlatformPaths::default_index_path(&repo_path));

        tracing::info!(
            "Opening index {} for repository {}",
            index_path.display(),
            repo_path.display()
        );
        tracing::debug!("Similarity backend: {}", config.similarity.backend);

        let store = IndexStore::open(&index_path).await?;
        let oracle = similarity::create_oracle(&config.similarity)?;

        Ok(Self {
            repo_path,
            store,
            normalizer: Arc::new(EnglishNormalizer::new()),
            oracle,
            config: Arc::new(config),
        })
    }

    /// Replace the similarity oracle
    pub fn with_oracle(mut self, oracle: Arc<dyn SimilarityOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Replace the token normalizer (used for both indexing and queries)
    pub fn with_normalizer(mut self, normalizer: Arc<dyn TokenNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn index_path(&self) -> &Path {
        self.store.path()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Files whose history mentions tokens matching `pattern`
    pub async fn basic_search(&self, pattern: &str) -> Result<Vec<BasicSearchHit>> {
        self.ensure_initialized().await?;
        self.query_engine().basic_search(pattern).await
    }

    /// Rank files for a free-text query using lexical and semantic evidence
    pub async fn similarity_search(
        &self,
        query: &str,
        similar_tokens: Option<usize>,
        limit: Option<usize>,
    ) -> Result<SearchResponse> {
        self.ensure_initialized().await?;
        self.query_engine()
            .similarity_search(query, similar_tokens, limit)
            .await
    }

    /// Vocabulary describing a file, best scored first
    pub async fn tokens_for_file(&self, path: &str) -> Result<Vec<TokenScore>> {
        self.ensure_initialized().await?;
        Ok(self.store.tokens_for_file(path).await?)
    }

    /// Most recent completed indexing run
    pub async fn last_update(&self) -> Result<Option<UpdateRecord>> {
        Ok(self.store.last_update().await?)
    }

    /// Index summary, including whether HEAD has moved past the watermark
    pub async fn status(&self) -> Result<IndexStatus> {
        let repo_path = self.repo_path.clone();
        let head = tokio::task::spawn_blocking(move || GitWalker::discover(&repo_path)?.head())
            .await
            .map_err(|e| RosettaError::other(format!("Git head task failed: {}", e)))??;

        let last_update = self.store.last_update().await?;
        let watermark = last_update.as_ref().map(|u| u.last_rev.clone());
        Ok(IndexStatus {
            index_path: self.index_path().display().to_string(),
            initialized: last_update.is_some(),
            commits: self.store.commit_count().await?,
            tokens: self.store.vocabulary_size().await?,
            files: self.store.file_count().await?,
            up_to_date: watermark.as_deref() == Some(head.as_str()),
            head,
            watermark,
            last_update,
        })
    }

    fn query_engine(&self) -> QueryEngine {
        QueryEngine::new(
            self.store.clone(),
            Arc::clone(&self.normalizer),
            Arc::clone(&self.oracle),
            SearchSettings::from_config(&self.config),
        )
    }

    async fn ensure_initialized(&self) -> Result<()> {
        if self.store.watermark().await?.is_none() {
            return Err(RosettaError::IndexNotInitialized);
        }
        Ok(())
    }

    /// Directory holding the single-writer lock file
    pub(crate) fn lock_dir(&self) -> PathBuf {
        self.config
            .lock
            .dir
            .clone()
            .unwrap_or_else(PlatformPaths::lock_dir)
    }

    /// Identity used for the single-writer lock
    pub(crate) fn lock_identity(&self) -> String {
        let path = self.index_path();
        std::fs::canonicalize(path)
            .unwrap_or_else(|_| path.to_path_buf())
            .to_string_lossy()
            .to_string()
    }
}

#[cfg(test)]
pub(crate) mod test_repo;

#[cfg(test)]
mod tests;
