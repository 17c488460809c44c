//! Embedding models.
//!
//! Every backend implements [`Embedder`]. The retrieval service only ever sees
//! an `Arc<dyn Embedder>`, built from configuration by
//! [`EmbeddingProvider::create`].
//!
//! | Backend | Model id | Notes |
//! |---------|----------|-------|
//! | [`HashingEmbedder`] | `hashing-v1-{dims}` | Feature hashing, no download, default |
//! | [`OllamaEmbedder`] | `ollama/{model}` | `POST {base_url}/api/embed` |
//! | [`FastEmbedder`] | `fastembed/{model}` | Local ONNX, `local-embeddings` feature |

use crate::rag::cache::CachedEmbedder;
use crate::types::{AppError, Result};
use crate::utils::toml_config::{EmbeddingBackend, EmbeddingConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Maps text to fixed-size dense vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts, returning vectors in input order.
    ///
    /// All-or-nothing: any failure fails the whole batch.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Length of every vector this embedder produces.
    fn dimensions(&self) -> usize;

    /// Stable identifier of the model. Vectors from different ids are not comparable.
    fn model_id(&self) -> &str;
}

/// Check a batch result against the request: one vector per text, each of
/// `dimensions` finite values.
pub fn check_batch(expected: usize, dimensions: usize, vectors: &[Vec<f32>]) -> Result<()> {
    if vectors.len() != expected {
        return Err(AppError::Embedding(format!(
            "Embedder returned {} vectors for {} texts",
            vectors.len(),
            expected
        )));
    }
    for (i, vector) in vectors.iter().enumerate() {
        if vector.len() != dimensions {
            return Err(AppError::Embedding(format!(
                "Embedding {} has {} dimensions, expected {}",
                i,
                vector.len(),
                dimensions
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(AppError::Embedding(format!(
                "Embedding {} contains NaN or infinite values",
                i
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Hashing Embedder
// ============================================================================

/// Deterministic bag-of-words embedder using signed feature hashing.
///
/// Tokens are lowercased alphanumeric runs. Each token adds `±1` to one of
/// `dimensions` buckets; the result is L2-normalised. Texts sharing words get
/// high cosine similarity, which is enough for small corpora and for tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
    model_id: String,
}

impl HashingEmbedder {
    /// Create an embedder producing `dimensions`-long vectors.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(AppError::Configuration(
                "Embedding dimensions must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            dimensions,
            model_id: format!("hashing-v1-{}", dimensions),
        })
    }

    /// Embed synchronously.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// 64-bit FNV-1a. Must not change: hashed vectors are persisted.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

// ============================================================================
// Ollama Embedder
// ============================================================================

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embeddings from an Ollama server (`POST {base_url}/api/embed`).
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dimensions: usize,
    model_id: String,
}

impl OllamaEmbedder {
    /// Default Ollama embedding model.
    pub const DEFAULT_MODEL: &'static str = "nomic-embed-text";

    pub fn new(base_url: &str, model: &str, dimensions: usize, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Embedding(format!("http client build: {}", e)))?;

        Ok(Self {
            client,
            url: format!("{}/api/embed", base_url.trim_end_matches('/')),
            model: model.to_string(),
            dimensions,
            model_id: format!("ollama/{}", model),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| AppError::Embedding("Ollama returned no embedding".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = OllamaEmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("POST {}: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".into());
            return Err(AppError::Embedding(format!(
                "Ollama embed returned {}: {}",
                status, body
            )));
        }

        let parsed: OllamaEmbedResponse = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("parse embeddings json: {}", e)))?;

        check_batch(texts.len(), self.dimensions, &parsed.embeddings)?;
        debug!(count = texts.len(), model = %self.model, "Embedded batch via Ollama");
        Ok(parsed.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// FastEmbed (local ONNX)
// ============================================================================

#[cfg(feature = "local-embeddings")]
pub use local::FastEmbedder;

#[cfg(feature = "local-embeddings")]
mod local {
    use super::*;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

    /// Local ONNX embedding model run on the blocking thread pool.
    pub struct FastEmbedder {
        model: Arc<tokio::sync::Mutex<TextEmbedding>>,
        dimensions: usize,
        model_id: String,
    }

    impl FastEmbedder {
        /// Default local model.
        pub const DEFAULT_MODEL: &'static str = "sentence-transformers/all-MiniLM-L6-v2";

        /// Load (and download on first use) the named model.
        pub async fn new(model_name: &str) -> Result<Self> {
            let (model, dimensions) = resolve_model(model_name)?;

            let text_embedding = tokio::task::spawn_blocking(move || {
                TextEmbedding::try_new(InitOptions::new(model).with_show_download_progress(false))
                    .map_err(|e| {
                        AppError::Embedding(format!("Failed to load embedding model: {}", e))
                    })
            })
            .await
            .map_err(|e| AppError::Internal(format!("Embedding model task failed: {}", e)))??;

            Ok(Self {
                model: Arc::new(tokio::sync::Mutex::new(text_embedding)),
                dimensions,
                model_id: format!("fastembed/{}", model_name),
            })
        }
    }

    fn resolve_model(name: &str) -> Result<(EmbeddingModel, usize)> {
        match name {
            "sentence-transformers/all-MiniLM-L6-v2" | "all-MiniLM-L6-v2" => {
                Ok((EmbeddingModel::AllMiniLML6V2, 384))
            }
            "BAAI/bge-small-en-v1.5" | "bge-small-en-v1.5" => {
                Ok((EmbeddingModel::BGESmallENV15, 384))
            }
            "BAAI/bge-base-en-v1.5" | "bge-base-en-v1.5" => {
                Ok((EmbeddingModel::BGEBaseENV15, 768))
            }
            other => Err(AppError::Configuration(format!(
                "Unsupported local embedding model: {}",
                other
            ))),
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut vectors = self.embed_batch(&[text.to_string()]).await?;
            vectors
                .pop()
                .ok_or_else(|| AppError::Embedding("Model returned no embedding".to_string()))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let model = Arc::clone(&self.model);
            let texts = texts.to_vec();
            let expected = texts.len();

            let vectors = tokio::task::spawn_blocking(move || {
                let mut model = model.blocking_lock();
                model.embed(texts, None)
            })
            .await
            .map_err(|e| AppError::Internal(format!("Embedding task failed: {}", e)))?
            .map_err(|e| AppError::Embedding(format!("Embedding failed: {}", e)))?;

            check_batch(expected, self.dimensions, &vectors)?;
            Ok(vectors)
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn model_id(&self) -> &str {
            &self.model_id
        }
    }
}

// ============================================================================
// Provider
// ============================================================================

/// A configured embedding backend, ready to be instantiated.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingProvider {
    Hashing {
        dimensions: usize,
    },
    Ollama {
        base_url: String,
        model: String,
        dimensions: usize,
        timeout: Duration,
    },
    FastEmbed {
        model: String,
    },
}

impl EmbeddingProvider {
    /// Resolve the backend named in configuration.
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        match config.provider {
            EmbeddingBackend::Hashing => EmbeddingProvider::Hashing {
                dimensions: config.dimensions,
            },
            EmbeddingBackend::Ollama => EmbeddingProvider::Ollama {
                base_url: config.base_url.clone(),
                model: config
                    .model
                    .clone()
                    .unwrap_or_else(|| OllamaEmbedder::DEFAULT_MODEL.to_string()),
                dimensions: config.dimensions,
                timeout: Duration::from_secs(config.timeout_secs),
            },
            EmbeddingBackend::Fastembed => EmbeddingProvider::FastEmbed {
                model: config
                    .model
                    .clone()
                    .unwrap_or_else(|| "sentence-transformers/all-MiniLM-L6-v2".to_string()),
            },
        }
    }

    /// Instantiate the embedder.
    pub async fn create(&self) -> Result<Arc<dyn Embedder>> {
        match self {
            EmbeddingProvider::Hashing { dimensions } => {
                Ok(Arc::new(HashingEmbedder::new(*dimensions)?))
            }
            EmbeddingProvider::Ollama {
                base_url,
                model,
                dimensions,
                timeout,
            } => Ok(Arc::new(OllamaEmbedder::new(base_url, model, *dimensions, *timeout)?)),
            #[cfg(feature = "local-embeddings")]
            EmbeddingProvider::FastEmbed { model } => Ok(Arc::new(FastEmbedder::new(model).await?)),
            #[cfg(not(feature = "local-embeddings"))]
            EmbeddingProvider::FastEmbed { .. } => Err(AppError::Configuration(
                "The fastembed provider requires the local-embeddings feature".to_string(),
            )),
        }
    }

    /// Instantiate the embedder named in `config`, wrapped in a query cache
    /// unless `cache_capacity` is 0.
    pub async fn create_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
        let embedder = Self::from_config(config).create().await?;
        match CachedEmbedder::new(embedder.clone(), config.cache_capacity) {
            Some(cached) => Ok(Arc::new(cached)),
            None => Ok(embedder),
        }
    }
}
