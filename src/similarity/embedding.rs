use super::{SimilarityOracle, clamp_score};
use crate::error::SimilarityError;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};

/// Oracle backed by a local sentence embedding model
///
/// The model is loaded (and downloaded if needed) on first use. Token vectors
/// are cached for the lifetime of the oracle, so warming up with the whole
/// vocabulary makes every later call a pair of lookups.
///
/// Only one call loads the model. Calls made while it loads fail with
/// `Unavailable`, and once loading has failed every call fails with the same
/// `InitializationFailed` without retrying.
pub struct EmbeddingOracle {
    model: Arc<Mutex<Option<TextEmbedding>>>,
    ready: Arc<AtomicBool>,
    loading: Arc<AtomicBool>,
    init_failure: Arc<OnceLock<String>>,
    model_kind: EmbeddingModel,
    model_name: String,
    cache: RwLock<HashMap<String, Vec<f32>>>,
}

impl EmbeddingOracle {
    pub fn new(model_name: &str) -> Result<Self, SimilarityError> {
        let model_kind = parse_model(model_name)?;
        Ok(Self {
            model: Arc::new(Mutex::new(None)),
            ready: Arc::new(AtomicBool::new(false)),
            loading: Arc::new(AtomicBool::new(false)),
            init_failure: Arc::new(OnceLock::new()),
            model_kind,
            model_name: model_name.to_string(),
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Embed any of `texts` not already cached
    async fn ensure_embedded(&self, texts: &[String]) -> Result<(), SimilarityError> {
        let missing: Vec<String> = {
            let cache = self
                .cache
                .read()
                .map_err(|_| SimilarityError::Unavailable("embedding cache poisoned".to_string()))?;
            let mut missing: Vec<String> = texts
                .iter()
                .filter(|t| !cache.contains_key(t.as_str()))
                .cloned()
                .collect();
            missing.sort();
            missing.dedup();
            missing
        };

        if missing.is_empty() {
            return Ok(());
        }

        if let Some(reason) = self.init_failure.get() {
            return Err(SimilarityError::InitializationFailed(reason.clone()));
        }
        let loader = if self.ready.load(Ordering::Acquire) {
            None
        } else if self.loading.swap(true, Ordering::AcqRel) {
            return Err(SimilarityError::Unavailable(
                "embedding model is still loading".to_string(),
            ));
        } else {
            Some(LoadingFlag(Arc::clone(&self.loading)))
        };

        tracing::debug!("Embedding {} uncached tokens", missing.len());

        let model = Arc::clone(&self.model);
        let ready = Arc::clone(&self.ready);
        let init_failure = Arc::clone(&self.init_failure);
        let model_kind = self.model_kind.clone();
        let batch = missing.clone();
        let vectors = tokio::task::spawn_blocking(move || {
            let _loader = loader;
            let mut guard = model
                .lock()
                .map_err(|_| SimilarityError::Unavailable("embedding model poisoned".to_string()))?;

            if guard.is_none() {
                tracing::info!("Initializing FastEmbed model: {:?}", model_kind);
                let mut options = InitOptions::default();
                options.model_name = model_kind;
                options.show_download_progress = true;
                match TextEmbedding::try_new(options) {
                    Ok(loaded) => *guard = Some(loaded),
                    Err(e) => {
                        let reason = e.to_string();
                        tracing::error!("Embedding model failed to load: {}", reason);
                        let _ = init_failure.set(reason.clone());
                        return Err(SimilarityError::InitializationFailed(reason));
                    }
                }
            }
            ready.store(true, Ordering::Release);

            let Some(embedder) = guard.as_mut() else {
                return Err(SimilarityError::Unavailable(
                    "embedding model not loaded".to_string(),
                ));
            };
            embedder
                .embed(batch, None)
                .map_err(|e| SimilarityError::Unavailable(e.to_string()))
        })
        .await
        .map_err(|e| SimilarityError::Unavailable(format!("embedding task panicked: {}", e)))??;

        if vectors.len() != missing.len() {
            return Err(SimilarityError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                missing.len(),
                vectors.len()
            )));
        }

        let mut cache = self
            .cache
            .write()
            .map_err(|_| SimilarityError::Unavailable("embedding cache poisoned".to_string()))?;
        cache.extend(missing.into_iter().zip(vectors));
        Ok(())
    }
}

#[async_trait]
impl SimilarityOracle for EmbeddingOracle {
    async fn similarity(&self, a: &str, b: &str) -> Result<f32, SimilarityError> {
        self.ensure_embedded(&[a.to_string(), b.to_string()]).await?;

        let cache = self
            .cache
            .read()
            .map_err(|_| SimilarityError::Unavailable("embedding cache poisoned".to_string()))?;
        match (cache.get(a), cache.get(b)) {
            (Some(va), Some(vb)) => clamp_score(cosine_similarity(va, vb)),
            _ => Err(SimilarityError::Unavailable(
                "token missing from embedding cache".to_string(),
            )),
        }
    }

    async fn warm_up(&self, vocabulary: &[String]) -> Result<(), SimilarityError> {
        tracing::info!(
            "Warming up {} with {} tokens",
            self.model_name,
            vocabulary.len()
        );
        self.ensure_embedded(vocabulary).await
    }

    fn name(&self) -> &str {
        "embedding"
    }
}

/// Clears the loading flag when the loading call finishes, panics included
struct LoadingFlag(Arc<AtomicBool>);

impl Drop for LoadingFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn parse_model(name: &str) -> Result<EmbeddingModel, SimilarityError> {
    match name {
        "all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
            Ok(EmbeddingModel::AllMiniLML6V2)
        }
        "all-MiniLM-L12-v2" | "sentence-transformers/all-MiniLM-L12-v2" => {
            Ok(EmbeddingModel::AllMiniLML12V2)
        }
        "BAAI/bge-small-en-v1.5" | "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "BAAI/bge-base-en-v1.5" | "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        other => Err(SimilarityError::InitializationFailed(format!(
            "unsupported embedding model '{}'",
            other
        ))),
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_opposite_vectors_clamp_to_zero() {
        let raw = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert_eq!(clamp_score(raw).unwrap(), 0.0);
    }

    #[test]
    fn test_parse_model() {
        assert!(matches!(
            parse_model("all-MiniLM-L6-v2"),
            Ok(EmbeddingModel::AllMiniLML6V2)
        ));
        assert!(matches!(
            parse_model("BAAI/bge-base-en-v1.5"),
            Ok(EmbeddingModel::BGEBaseENV15)
        ));
        assert!(parse_model("word2vec").is_err());
    }

    #[test]
    fn test_new_does_not_load_model() {
        let oracle = EmbeddingOracle::new("all-MiniLM-L6-v2").unwrap();
        assert_eq!(oracle.name(), "embedding");
        assert!(oracle.model.lock().unwrap().is_none());
        assert!(!oracle.ready.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_failed_load_fails_fast() {
        let oracle = EmbeddingOracle::new("all-MiniLM-L6-v2").unwrap();
        oracle
            .init_failure
            .set("model download failed".to_string())
            .unwrap();

        let start = std::time::Instant::now();
        for _ in 0..3 {
            match oracle.similarity("parser", "lexer").await {
                Err(SimilarityError::InitializationFailed(reason)) => {
                    assert_eq!(reason, "model download failed");
                }
                other => panic!("expected InitializationFailed, got {:?}", other),
            }
        }
        assert!(start.elapsed() < std::time::Duration::from_secs(1));
        assert!(!oracle.loading.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_calls_during_load_are_unavailable() {
        let oracle = EmbeddingOracle::new("all-MiniLM-L6-v2").unwrap();
        oracle.loading.store(true, Ordering::Release);

        let err = oracle
            .warm_up(&["parser".to_string(), "crash".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, SimilarityError::Unavailable(_)));
        assert!(oracle.model.lock().unwrap().is_none());
    }

    #[test]
    fn test_loading_flag_clears_on_drop() {
        let loading = Arc::new(AtomicBool::new(true));
        drop(LoadingFlag(Arc::clone(&loading)));
        assert!(!loading.load(Ordering::Acquire));
    }
}
