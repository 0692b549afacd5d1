//! Query resolution and ranking
//!
//! Two strategies over the index:
//! - lexical: wildcard lookup of a vocabulary token, files ranked by TF-IDF
//! - hybrid: each normalized query token is expanded to its closest
//!   vocabulary tokens through the similarity oracle, then per-file evidence
//!   is merged and ranked

use crate::config::Config;
use crate::error::Result;
use crate::nlp::TokenNormalizer;
use crate::similarity::SimilarityOracle;
use crate::store::IndexStore;
use crate::types::{BasicSearchHit, FileResult, MatchedToken, SearchResponse};
use futures::stream::{self, StreamExt};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tunables for hybrid search
#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Vocabulary tokens kept per query token
    pub similar_tokens: usize,
    /// Files returned
    pub limit: usize,
    /// Pairs at or below this similarity are dropped
    pub min_similarity: f32,
    /// Per oracle call
    pub oracle_timeout: Duration,
    /// Oracle calls in flight
    pub concurrency: usize,
    /// Budget for preparing the oracle once per query
    pub warm_up_timeout: Duration,
}

impl SearchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            similar_tokens: config.search.similar_tokens,
            limit: config.search.limit,
            min_similarity: config.search.min_similarity,
            oracle_timeout: Duration::from_millis(config.similarity.timeout_ms),
            concurrency: config.similarity.concurrency,
            warm_up_timeout: Duration::from_millis(config.similarity.warm_up_timeout_ms),
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// A vocabulary token retained for one query token
#[derive(Debug, Clone)]
struct Expansion {
    token_id: i64,
    token: String,
    similarity: f32,
}

#[derive(Default)]
struct FileEvidence {
    query_tokens: BTreeSet<String>,
    matched: Vec<MatchedToken>,
    tf_idf_sum: f64,
}

/// Resolves queries against an index
pub struct QueryEngine {
    store: IndexStore,
    normalizer: Arc<dyn TokenNormalizer>,
    oracle: Arc<dyn SimilarityOracle>,
    settings: SearchSettings,
}

impl QueryEngine {
    pub fn new(
        store: IndexStore,
        normalizer: Arc<dyn TokenNormalizer>,
        oracle: Arc<dyn SimilarityOracle>,
        settings: SearchSettings,
    ) -> Self {
        Self {
            store,
            normalizer,
            oracle,
            settings,
        }
    }

    /// Files associated with tokens matching `pattern`, best first
    ///
    /// Each file is scored by its best matching token. Ties are broken by
    /// path so the order is stable across runs.
    pub async fn basic_search(&self, pattern: &str) -> Result<Vec<BasicSearchHit>> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self.store.files_for_token(pattern).await?;
        tracing::debug!("Pattern '{}' matched {} rows", pattern, rows.len());

        let mut best: HashMap<String, BasicSearchHit> = HashMap::new();
        for row in rows {
            match best.get_mut(&row.path) {
                Some(hit) if row.tf_idf > hit.score => {
                    hit.score = row.tf_idf;
                    hit.token = row.token;
                }
                Some(_) => {}
                None => {
                    best.insert(
                        row.path.clone(),
                        BasicSearchHit {
                            path: row.path,
                            token: row.token,
                            score: row.tf_idf,
                        },
                    );
                }
            }
        }

        let mut hits: Vec<BasicSearchHit> = best.into_values().collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
        Ok(hits)
    }

    /// Hybrid search
    ///
    /// `similar_tokens` and `limit` fall back to the engine settings.
    pub async fn similarity_search(
        &self,
        query: &str,
        similar_tokens: Option<usize>,
        limit: Option<usize>,
    ) -> Result<SearchResponse> {
        let start = Instant::now();
        let similar_tokens = similar_tokens.unwrap_or(self.settings.similar_tokens).max(1);
        let limit = limit.unwrap_or(self.settings.limit);

        let normalized = self.normalizer.normalize(query);
        let query_tokens = normalized.distinct_tokens();

        let mut response = SearchResponse {
            query: query.to_string(),
            normalized_query: normalized.tokens.clone(),
            results: Vec::new(),
            degraded_pairs: 0,
            semantic_partial: false,
            duration_ms: 0,
        };

        if query_tokens.is_empty() {
            tracing::debug!("Query '{}' normalized to nothing", query);
            response.duration_ms = start.elapsed().as_millis() as u64;
            return Ok(response);
        }

        let vocabulary = self.store.all_tokens().await?;
        if vocabulary.is_empty() {
            response.duration_ms = start.elapsed().as_millis() as u64;
            return Ok(response);
        }

        let mut warm: Vec<String> = vocabulary.iter().map(|(_, t)| t.clone()).collect();
        warm.extend(query_tokens.iter().cloned());
        // An expired warm-up still leaves per-pair calls under their own timeout
        let warm_up_timeout = self.settings.warm_up_timeout;
        let warm_up_expired =
            match tokio::time::timeout(warm_up_timeout, self.oracle.warm_up(&warm)).await {
                Ok(Ok(())) => false,
                Ok(Err(e)) => {
                    tracing::warn!("Similarity warm-up failed, continuing per pair: {}", e);
                    false
                }
                Err(_) => {
                    tracing::warn!("Similarity warm-up timed out after {:?}", warm_up_timeout);
                    true
                }
            };

        let mut evidence: HashMap<String, FileEvidence> = HashMap::new();
        for query_token in &query_tokens {
            let (expansions, degraded) = self
                .expand(query_token, &vocabulary, similar_tokens)
                .await;
            response.degraded_pairs += degraded;

            tracing::debug!(
                "'{}' expanded to {:?}",
                query_token,
                expansions.iter().map(|e| e.token.as_str()).collect::<Vec<_>>()
            );

            for expansion in expansions {
                for (path, tf_idf) in self.store.files_for_token_id(expansion.token_id).await? {
                    let entry = evidence.entry(path).or_default();
                    entry.query_tokens.insert(query_token.clone());
                    entry.tf_idf_sum += tf_idf;
                    entry.matched.push(MatchedToken {
                        query_token: query_token.clone(),
                        token: expansion.token.clone(),
                        similarity: expansion.similarity,
                        tf_idf,
                    });
                }
            }
        }

        response.results = rank(evidence, limit);
        response.semantic_partial = response.degraded_pairs > 0 || warm_up_expired;
        response.duration_ms = start.elapsed().as_millis() as u64;

        if response.semantic_partial {
            tracing::warn!(
                "Semantic expansion partially unavailable: {} oracle calls degraded, warm-up expired: {}",
                response.degraded_pairs,
                warm_up_expired
            );
        }
        tracing::info!(
            "Search '{}' returned {} files in {}ms",
            query,
            response.results.len(),
            response.duration_ms
        );

        Ok(response)
    }

    /// Score `query_token` against the vocabulary and keep the best matches
    ///
    /// Returns the retained expansions and the number of degraded oracle
    /// calls. An identical vocabulary token scores 1.0 without an oracle call.
    async fn expand(
        &self,
        query_token: &str,
        vocabulary: &[(i64, String)],
        keep: usize,
    ) -> (Vec<Expansion>, usize) {
        let oracle = self.oracle.as_ref();
        let timeout = self.settings.oracle_timeout;

        let scores: Vec<Option<f32>> = stream::iter(vocabulary.iter())
            .map(|(_, token)| async move {
                if token == query_token {
                    return Some(1.0);
                }
                match tokio::time::timeout(timeout, oracle.similarity(query_token, token)).await {
                    Ok(Ok(score)) => Some(score),
                    Ok(Err(e)) => {
                        tracing::debug!("Similarity({}, {}) failed: {}", query_token, token, e);
                        None
                    }
                    Err(_) => {
                        tracing::debug!(
                            "Similarity({}, {}) timed out after {:?}",
                            query_token,
                            token,
                            timeout
                        );
                        None
                    }
                }
            })
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let degraded = scores.iter().filter(|s| s.is_none()).count();

        let mut candidates: Vec<Expansion> = vocabulary
            .iter()
            .zip(scores)
            .filter_map(|((token_id, token), score)| {
                let similarity = score.unwrap_or(0.0);
                (similarity > self.settings.min_similarity).then(|| Expansion {
                    token_id: *token_id,
                    token: token.clone(),
                    similarity,
                })
            })
            .collect();

        // stable: equal scores keep vocabulary order
        candidates.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        candidates.truncate(keep);

        (candidates, degraded)
    }
}

/// Order files by distinct query tokens, then TF-IDF sum, then path
fn rank(evidence: HashMap<String, FileEvidence>, limit: usize) -> Vec<FileResult> {
    let mut results: Vec<FileResult> = evidence
        .into_iter()
        .map(|(path, ev)| FileResult {
            path,
            query_tokens: ev.query_tokens.into_iter().collect(),
            matched_tokens: ev.matched,
            tf_idf_sum: ev.tf_idf_sum,
        })
        .collect();

    results.sort_by(compare_results);
    results.truncate(limit);
    results
}

fn compare_results(a: &FileResult, b: &FileResult) -> Ordering {
    b.query_tokens
        .len()
        .cmp(&a.query_tokens.len())
        .then_with(|| b.tf_idf_sum.total_cmp(&a.tf_idf_sum))
        .then_with(|| a.path.cmp(&b.path))
}
