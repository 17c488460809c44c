//! Mock embedders for testing.
//!
//! Shared across test files so each suite can observe how often the model is
//! called, or simulate a model that is down, without any network access.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tutor::rag::{Embedder, HashingEmbedder};
use tutor::types::{AppError, Result};

/// Hashing embedder that records every call.
///
/// `delay` is awaited inside `embed_batch`, which widens the window in which
/// concurrent builds could overlap.
pub struct CountingEmbedder {
    inner: HashingEmbedder,
    delay: Duration,
    batch_calls: AtomicUsize,
    texts_embedded: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self::with_delay(dimensions, Duration::ZERO)
    }

    pub fn with_delay(dimensions: usize, delay: Duration) -> Self {
        Self {
            inner: HashingEmbedder::new(dimensions).expect("dimensions must be positive"),
            delay,
            batch_calls: AtomicUsize::new(0),
            texts_embedded: AtomicUsize::new(0),
        }
    }

    /// Number of `embed_batch` calls so far.
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Number of texts embedded, single or batched.
    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.texts_embedded.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.inner.embed_sync(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

/// Embedder whose model is always unavailable.
pub struct FailingEmbedder {
    pub dimensions: usize,
}

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(AppError::Embedding("Mock embedding failure".to_string()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        "mock-failing"
    }
}
