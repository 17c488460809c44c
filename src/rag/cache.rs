//! Embedding cache for the retrieval pipeline
//!
//! Learners ask the same questions over and over; [`CachedEmbedder`] keeps the
//! most recently used query embeddings in memory so a repeated query skips the
//! model call.
//!
//! # Cache Key Strategy
//!
//! Keys are SHA-256 hashes of `model_id + text`, so two models never share an
//! entry and keys are independent of process or platform.

use crate::rag::embeddings::Embedder;
use crate::types::Result;
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of entries in cache
    pub entry_count: usize,
    /// Maximum number of entries
    pub capacity: usize,
}

impl CacheStats {
    /// Calculate hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Compute a cache key for the given text and model
pub fn compute_key(model_id: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model_id.as_bytes());
    hasher.update(b"|");
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// LRU-cached wrapper around another embedder.
///
/// Reports the inner embedder's `model_id` and `dimensions`, so wrapping does
/// not change which collections it is compatible with.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedEmbedder {
    /// Wrap `inner` with room for `capacity` embeddings. `None` if `capacity` is 0.
    pub fn new(inner: Arc<dyn Embedder>, capacity: usize) -> Option<Self> {
        let capacity = NonZeroUsize::new(capacity)?;
        Some(Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let cache = self.cache.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: cache.len(),
            capacity: cache.cap().get(),
        }
    }

    /// Clear all entries from the cache
    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    fn lookup(&self, key: &str) -> Option<Vec<f32>> {
        let found = self.cache.lock().get(key).cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = compute_key(self.inner.model_id(), text);
        if let Some(vector) = self.lookup(&key) {
            return Ok(vector);
        }

        let vector = self.inner.embed(text).await?;
        self.cache.lock().put(key, vector.clone());
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let keys: Vec<String> = texts
            .iter()
            .map(|t| compute_key(self.inner.model_id(), t))
            .collect();

        let mut vectors: Vec<Option<Vec<f32>>> = keys.iter().map(|k| self.lookup(k)).collect();
        let missing: Vec<usize> = (0..texts.len()).filter(|&i| vectors[i].is_none()).collect();

        if !missing.is_empty() {
            let to_embed: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let embedded = self.inner.embed_batch(&to_embed).await?;
            crate::rag::embeddings::check_batch(
                to_embed.len(),
                self.inner.dimensions(),
                &embedded,
            )?;

            let mut cache = self.cache.lock();
            for (&i, vector) in missing.iter().zip(embedded) {
                cache.put(keys[i].clone(), vector.clone());
                vectors[i] = Some(vector);
            }
        }

        Ok(vectors.into_iter().flatten().collect())
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::embeddings::HashingEmbedder;
    use std::sync::atomic::AtomicUsize;

    /// Counts how many texts reach the model.
    struct CountingEmbedder {
        inner: HashingEmbedder,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.inner.embed_sync(text))
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        fn model_id(&self) -> &str {
            self.inner.model_id()
        }
    }

    fn counting() -> Arc<CountingEmbedder> {
        Arc::new(CountingEmbedder {
            inner: HashingEmbedder::new(16).unwrap(),
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_compute_key() {
        let key1 = compute_key("model-a", "hello world");
        let key2 = compute_key("model-a", "hello world");
        let key3 = compute_key("model-b", "hello world");
        let key4 = compute_key("model-a", "hello there");

        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
        assert_ne!(key1, key4);
        assert_eq!(key1.len(), 64);
    }

    #[tokio::test]
    async fn test_repeated_query_hits_cache() {
        let inner = counting();
        let cached = CachedEmbedder::new(inner.clone(), 8).unwrap();

        let first = cached.embed("what is osmosis").await.unwrap();
        let second = cached.embed("what is osmosis").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        let stats = cached.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 50.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_batch_only_embeds_misses_in_order() {
        let inner = counting();
        let cached = CachedEmbedder::new(inner.clone(), 8).unwrap();
        cached.embed("b").await.unwrap();

        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let vectors = cached.embed_batch(&texts).await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
        let direct = HashingEmbedder::new(16).unwrap();
        for (text, vector) in texts.iter().zip(&vectors) {
            assert_eq!(vector, &direct.embed_sync(text));
        }
    }

    #[tokio::test]
    async fn test_lru_eviction_and_zero_capacity() {
        let inner = counting();
        let cached = CachedEmbedder::new(inner.clone(), 1).unwrap();
        cached.embed("one").await.unwrap();
        cached.embed("two").await.unwrap();
        cached.embed("one").await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
        assert_eq!(cached.stats().entry_count, 1);
        assert!(CachedEmbedder::new(inner, 0).is_none());
    }
}
