//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]** — returns errors; used when embeddings are not configured.
//! - **[`LocalProvider`]** — runs the model locally via fastembed; no network calls after model download.
//!
//! Also provides [`cosine_similarity`], the similarity measure the in-memory
//! vector index ranks with.
//!
//! # Model Lifecycle
//!
//! Loading the local model is expensive (ONNX session construction, first-run
//! download), so a [`LocalProvider`] loads it lazily on first use and keeps
//! exactly one instance for the life of the provider. Concurrent first calls
//! may race to initialize, but all callers end up sharing the one retained
//! instance. A load failure surfaces as
//! [`RetrievalError::ModelUnavailable`]; callers should treat that as
//! non-retryable within the process.
//!
//! # Provider Selection
//!
//! Use [`create_provider`] to instantiate the appropriate provider based
//! on the configuration:
//!
//! ```rust,no_run
//! # use tenant_context::config::EmbeddingConfig;
//! # use tenant_context::embedding::create_provider;
//! let mut config = EmbeddingConfig::default();
//! config.provider = "disabled".to_string();
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::error::RetrievalError;

/// Trait for embedding providers.
///
/// One provider instance is shared read-only across all callers; `embed_batch`
/// and `embed_one` use the same underlying model and produce vectors of the
/// same dimensionality. Vectors are deterministic: the same text through the
/// same instance yields the same vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError>;

    /// Embed a single text (e.g. a search query).
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::ModelUnavailable("empty embedding response".into()))
    }
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
///
/// Used when `embedding.provider = "disabled"` in the configuration.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        Err(RetrievalError::ModelUnavailable(
            "embedding provider is disabled".into(),
        ))
    }
}

// ============ Local Provider (fastembed) ============

/// Embedding provider for local inference via fastembed.
///
/// The model is downloaded on first use from Hugging Face and cached; after
/// that, embeddings run entirely offline. Inference happens on the blocking
/// thread pool so async callers are never stalled by ONNX execution.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalProvider {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model_kind: fastembed::EmbeddingModel,
    model: tokio::sync::OnceCell<std::sync::Arc<std::sync::Mutex<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_kind = config_to_fastembed_model(&config.model)?;
        Ok(Self {
            model_name: config.model.clone(),
            dims: config.dims,
            batch_size: config.batch_size,
            model_kind,
            model: tokio::sync::OnceCell::new(),
        })
    }

    async fn model(
        &self,
    ) -> Result<std::sync::Arc<std::sync::Mutex<fastembed::TextEmbedding>>, RetrievalError> {
        let loaded = self
            .model
            .get_or_try_init(|| async {
                let kind = self.model_kind.clone();
                let name = self.model_name.clone();
                tracing::info!(model = %name, "loading local embedding model");
                let model = tokio::task::spawn_blocking(move || {
                    fastembed::TextEmbedding::try_new(fastembed::InitOptions::new(kind))
                })
                .await
                .map_err(|e| RetrievalError::ModelUnavailable(e.to_string()))?
                .map_err(|e| RetrievalError::ModelUnavailable(e.to_string()))?;
                tracing::info!(model = %name, "local embedding model loaded");
                Ok::<_, RetrievalError>(std::sync::Arc::new(std::sync::Mutex::new(model)))
            })
            .await?;
        Ok(std::sync::Arc::clone(loaded))
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = self.model().await?;
        let texts = texts.to_vec();
        let batch_size = self.batch_size;

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| RetrievalError::ModelUnavailable("model lock poisoned".into()))?;
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| RetrievalError::ModelUnavailable(e.to_string()))
        })
        .await
        .map_err(|e| RetrievalError::ModelUnavailable(e.to_string()))?
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, multilingual-e5-small",
            other
        ),
    }
}

/// Create the appropriate [`EmbeddingProvider`] based on configuration.
///
/// # Supported Providers
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"local"` | `LocalProvider` (requires the `local-embeddings-fastembed` feature) |
///
/// # Errors
///
/// Returns an error for unknown provider names, unknown model names, or a
/// `"local"` provider without the feature compiled in.
pub fn create_provider(config: &EmbeddingConfig) -> Result<std::sync::Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(std::sync::Arc::new(DisabledProvider)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(std::sync::Arc::new(LocalProvider::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!(
            "Local embedding provider requires --features local-embeddings-fastembed"
        ),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty() {
        let sim = cosine_similarity(&[], &[]);
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_cosine_different_lengths() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0];
        let sim = cosine_similarity(&a, &b);
        assert_eq!(sim, 0.0);
    }

    #[tokio::test]
    async fn test_disabled_provider_is_model_unavailable() {
        assert_eq!(DisabledProvider.dims(), 0);
        let err = DisabledProvider
            .embed_batch(&["hello".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::ModelUnavailable(_)));
        let err = DisabledProvider.embed_one("hello").await.unwrap_err();
        assert!(matches!(err, RetrievalError::ModelUnavailable(_)));
    }

    #[test]
    fn test_create_provider_rejects_unknown_name() {
        let mut config = EmbeddingConfig::default();
        config.provider = "openai".to_string();
        assert!(create_provider(&config).is_err());
    }
}
