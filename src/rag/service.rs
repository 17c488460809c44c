//! Retrieval service.
//!
//! Orchestrates the pipeline: corpus loader → chunker → embedder → vector index
//! when a collection is first needed, and query → embedder → index → ranked
//! passages on every request.
//!
//! Nothing happens at construction. The first request for a collection attaches
//! the persisted index if there is one and otherwise builds it from the corpus.
//! That load-or-build step runs under a per-collection async mutex, so
//! concurrent first requests embed the corpus once. Searches take no lock: an
//! attached collection is immutable and shared through an `Arc`.

use crate::rag::chunker::TextChunker;
use crate::rag::embeddings::{check_batch, Embedder, EmbeddingProvider};
use crate::rag::loader::load_documents_from_folder;
use crate::types::{
    AppError, BuildReport, CollectionStatus, IndexSource, Result, RetrievedChunk,
};
use crate::utils::toml_config::{AppConfig, RagConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use tutor_vector::{
    persistence, Collection, CollectionSpec, Config as VectorConfig, Record, VectorDb,
    VectorIndex, VectorMetadata,
};

/// Separator placed between passages in a context string.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Per-collection state: the index handle and the lock serialising load-or-build.
struct CollectionSlot {
    index: VectorIndex,
    build_lock: tokio::sync::Mutex<()>,
}

/// Shared retrieval service. Construct once and pass around as `Arc<RetrievalService>`.
pub struct RetrievalService {
    config: RagConfig,
    chunker: TextChunker,
    embedder: Arc<dyn Embedder>,
    db: VectorDb,
    slots: Mutex<HashMap<String, Arc<CollectionSlot>>>,
}

impl RetrievalService {
    /// Create a service over an opened vector database.
    ///
    /// # Errors
    ///
    /// `Configuration` if the chunk parameters are invalid.
    pub fn new(config: RagConfig, embedder: Arc<dyn Embedder>, db: VectorDb) -> Result<Self> {
        let chunker = TextChunker::new(config.chunk_size, config.chunk_overlap)?;
        Ok(Self {
            config,
            chunker,
            embedder,
            db,
            slots: Mutex::new(HashMap::new()),
        })
    }

    /// Build the configured embedder and open the index directory.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let embedder = EmbeddingProvider::create_from_config(&config.embedding).await?;
        let db = VectorDb::open(VectorConfig::persistent(&config.rag.index_dir)).await?;
        info!(
            index_dir = %config.rag.index_dir.display(),
            model = embedder.model_id(),
            dimensions = embedder.dimensions(),
            "Retrieval service ready"
        );
        Self::new(config.rag.clone(), embedder, db)
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Collection used when a caller does not name one.
    pub fn default_collection(&self) -> &str {
        &self.config.collection
    }

    fn slot(&self, collection: &str) -> Result<Arc<CollectionSlot>> {
        tutor_vector::validate_collection_name(collection)?;
        let mut slots = self.slots.lock();
        let slot = slots.entry(collection.to_string()).or_insert_with(|| {
            Arc::new(CollectionSlot {
                index: VectorIndex::new(self.db.clone()),
                build_lock: tokio::sync::Mutex::new(()),
            })
        });
        Ok(Arc::clone(slot))
    }

    fn attached(&self, collection: &str) -> Result<Arc<Collection>> {
        let slot = self.slots.lock().get(collection).cloned();
        match slot {
            Some(slot) => Ok(slot.index.collection()?),
            None => Err(AppError::Uninitialized(format!(
                "collection '{}' has not been built or loaded",
                collection
            ))),
        }
    }

    /// Make `collection` searchable: reuse the attached index, else load the
    /// persisted one, else build it from the documents in `corpus`.
    ///
    /// Idempotent. Only a missing collection triggers a build; a corrupted or
    /// incompatible one is reported as `IndexCorrupted` and left on disk.
    #[instrument(skip(self, corpus), fields(corpus = %corpus.display()))]
    pub async fn ensure_index(&self, collection: &str, corpus: &Path) -> Result<IndexSource> {
        self.attach_or_build(collection, Some(corpus)).await
    }

    /// Attach an existing collection without ever building it.
    ///
    /// `NotFound` if the collection is neither attached nor persisted.
    #[instrument(skip(self))]
    pub async fn load_index(&self, collection: &str) -> Result<IndexSource> {
        self.attach_or_build(collection, None).await
    }

    /// Make `collection` searchable the way the HTTP layer allows: the
    /// configured collection is built from the configured corpus on demand,
    /// any other collection must already exist.
    pub async fn prepare(&self, collection: &str) -> Result<IndexSource> {
        if collection == self.config.collection {
            let corpus = self.config.corpus_dir.clone();
            self.ensure_index(collection, &corpus).await
        } else {
            self.load_index(collection).await
        }
    }

    /// Drop `slot` from the map after a failed attach or build, unless another
    /// request still holds it or it became searchable.
    fn release_unused(&self, collection: &str, slot: &Arc<CollectionSlot>) {
        let mut slots = self.slots.lock();
        let ours = slots
            .get(collection)
            .is_some_and(|current| Arc::ptr_eq(current, slot));
        // one reference in the map, one held by the caller
        if ours && Arc::strong_count(slot) == 2 && slot.index.collection().is_err() {
            slots.remove(collection);
        }
    }

    async fn attach_or_build(
        &self,
        collection: &str,
        corpus: Option<&Path>,
    ) -> Result<IndexSource> {
        let slot = self.slot(collection)?;
        let result = self.attach_or_build_slot(&slot, collection, corpus).await;
        if result.is_err() {
            self.release_unused(collection, &slot);
        }
        result
    }

    async fn attach_or_build_slot(
        &self,
        slot: &CollectionSlot,
        collection: &str,
        corpus: Option<&Path>,
    ) -> Result<IndexSource> {
        if let Ok(attached) = slot.index.collection() {
            return Ok(IndexSource::Attached {
                chunks: attached.len(),
            });
        }

        let _guard = slot.build_lock.lock().await;
        // another request may have finished while we waited
        if let Ok(attached) = slot.index.collection() {
            return Ok(IndexSource::Attached {
                chunks: attached.len(),
            });
        }

        match self.db.load(collection).await {
            Ok(loaded) => {
                self.check_compatible(&loaded)?;
                let chunks = loaded.len();
                slot.index.attach(loaded);
                info!(collection, chunks, "Loaded persisted collection");
                Ok(IndexSource::Loaded { chunks })
            }
            Err(tutor_vector::Error::CollectionNotFound(_)) => match corpus {
                Some(corpus) => {
                    info!(collection, "No persisted collection, building from corpus");
                    let report = self.build_from_corpus(slot, collection, corpus, false).await?;
                    Ok(IndexSource::Built(report))
                }
                None => Err(AppError::NotFound(format!(
                    "Collection '{}' not found",
                    collection
                ))),
            },
            Err(e) => {
                warn!(collection, error = %e, "Persisted collection cannot be used");
                Err(e.into())
            }
        }
    }

    /// Build `collection` from `corpus`, replacing any persisted version.
    #[instrument(skip(self, corpus), fields(corpus = %corpus.display()))]
    pub async fn rebuild(&self, collection: &str, corpus: &Path) -> Result<BuildReport> {
        let slot = self.slot(collection)?;
        let result = {
            let _guard = slot.build_lock.lock().await;
            self.build_from_corpus(&slot, collection, corpus, true).await
        };
        if result.is_err() {
            self.release_unused(collection, &slot);
        }
        result
    }

    async fn build_from_corpus(
        &self,
        slot: &CollectionSlot,
        collection: &str,
        corpus: &Path,
        overwrite: bool,
    ) -> Result<BuildReport> {
        let report = load_documents_from_folder(corpus, &self.config.file_pattern).await?;

        let mut texts = Vec::new();
        let mut provenance = Vec::new();
        for document in &report.documents {
            for chunk in self.chunker.chunk(&document.content) {
                provenance.push((document.source.clone(), chunk.index, chunk.start));
                texts.push(chunk.text);
            }
        }
        debug!(
            documents = report.documents.len(),
            chunks = texts.len(),
            "Chunked corpus"
        );

        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_batch(&texts).await?
        };
        check_batch(texts.len(), self.embedder.dimensions(), &vectors)?;

        let records: Vec<Record> = texts
            .into_iter()
            .zip(vectors)
            .zip(provenance)
            .map(|((text, vector), (source, chunk_index, start))| {
                let mut metadata = VectorMetadata::new();
                metadata.insert("source", source.as_str());
                metadata.insert("chunk_index", chunk_index);
                metadata.insert("start", start);
                Record::new(format!("{}#{}", source, chunk_index), text, vector)
                    .with_metadata(metadata)
            })
            .collect();

        let chunks = records.len();
        let spec = CollectionSpec::new(self.embedder.dimensions())
            .with_metric(self.config.metric)
            .with_kind(self.config.index_kind)
            .with_model_id(self.embedder.model_id());

        if overwrite {
            slot.index.rebuild(collection, spec, records).await?;
        } else {
            slot.index.build(collection, spec, records).await?;
        }

        info!(
            collection,
            documents = report.documents.len(),
            chunks,
            skipped = report.skipped.len(),
            "Built collection"
        );

        Ok(BuildReport {
            collection: collection.to_string(),
            documents: report.documents.len(),
            chunks,
            skipped: report.skipped,
        })
    }

    /// Reject collections whose vectors came from a different embedding space.
    fn check_compatible(&self, collection: &Collection) -> Result<()> {
        if collection.dimensions() != self.embedder.dimensions() {
            return Err(AppError::IndexCorrupted(format!(
                "Collection '{}' holds {}-dimensional vectors but the embedder produces {}; rebuild it",
                collection.name(),
                collection.dimensions(),
                self.embedder.dimensions()
            )));
        }
        if let Some(model_id) = collection.model_id() {
            if model_id != self.embedder.model_id() {
                return Err(AppError::IndexCorrupted(format!(
                    "Collection '{}' was built with model '{}' but the embedder is '{}'; rebuild it",
                    collection.name(),
                    model_id,
                    self.embedder.model_id()
                )));
            }
        }
        Ok(())
    }

    /// Validate a requested `k` and clamp it to `max_k`.
    pub fn checked_k(&self, k: usize) -> Result<usize> {
        if k == 0 {
            return Err(AppError::InvalidInput("k must be a positive integer".to_string()));
        }
        Ok(k.min(self.config.max_k))
    }

    /// The `k` most similar chunks of an attached collection, best first.
    ///
    /// # Errors
    ///
    /// `Uninitialized` if the collection was never built or loaded in this
    /// service; `InvalidInput` for `k == 0` or an empty query.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn retrieve_with_scores(
        &self,
        collection: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let k = self.checked_k(k)?;
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput("query must not be empty".to_string()));
        }
        let attached = self.attached(collection)?;

        let query_vector = self.embedder.embed(query).await?;
        check_batch(1, self.embedder.dimensions(), std::slice::from_ref(&query_vector))?;

        let hits = attached.search(&query_vector, k)?;
        debug!(hits = hits.len(), "Retrieved chunks");

        Ok(hits
            .into_iter()
            .map(|hit| {
                let metadata = hit.metadata.as_ref();
                RetrievedChunk {
                    source: metadata
                        .and_then(|m| m.get_string("source"))
                        .unwrap_or_default()
                        .to_string(),
                    chunk_index: metadata
                        .and_then(|m| m.get_int("chunk_index"))
                        .and_then(|i| usize::try_from(i).ok())
                        .unwrap_or_default(),
                    text: hit.content,
                    score: hit.score,
                }
            })
            .collect())
    }

    /// Context string for `query`: the texts of the top `k` chunks in rank
    /// order, joined with [`CONTEXT_SEPARATOR`]. Empty if the collection is empty.
    pub async fn query(&self, collection: &str, query: &str, k: usize) -> Result<String> {
        let chunks = self.retrieve_with_scores(collection, query, k).await?;
        Ok(join_context(&chunks))
    }

    /// Ensure the index for `collection` exists, then return the context for `query`.
    pub async fn get_context(
        &self,
        query: &str,
        k: usize,
        collection: &str,
        corpus: &Path,
    ) -> Result<String> {
        self.ensure_index(collection, corpus).await?;
        self.query(collection, query, k).await
    }

    /// What is known about `collection` in this process and on disk.
    pub async fn status(&self, collection: &str) -> Result<CollectionStatus> {
        tutor_vector::validate_collection_name(collection)?;
        let stats = self.attached(collection).ok().map(|c| c.stats());
        let persisted = match self.db.data_path() {
            Some(path) => persistence::collection_exists(path, collection).await?,
            None => false,
        };

        Ok(CollectionStatus {
            collection: collection.to_string(),
            attached: stats.is_some(),
            persisted,
            stats,
        })
    }
}

/// Join passage texts in the order given.
pub fn join_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::embeddings::HashingEmbedder;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(AppError::Embedding("model offline".to_string()))
        }

        fn dimensions(&self) -> usize {
            8
        }

        fn model_id(&self) -> &str {
            "failing"
        }
    }

    fn rag_config(dir: &TempDir) -> RagConfig {
        RagConfig {
            index_dir: dir.path().join("index"),
            corpus_dir: dir.path().join("docs"),
            chunk_size: 100,
            chunk_overlap: 20,
            ..RagConfig::default()
        }
    }

    fn write_corpus(dir: &TempDir) {
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(
            docs.join("cells.txt"),
            "Mitochondria are the powerhouse of the cell.",
        )
        .unwrap();
        std::fs::write(
            docs.join("plants.txt"),
            "Chloroplasts carry out photosynthesis in plants.",
        )
        .unwrap();
    }

    async fn service(dir: &TempDir, embedder: Arc<dyn Embedder>) -> RetrievalService {
        let config = rag_config(dir);
        let db = VectorDb::open(VectorConfig::persistent(&config.index_dir)).await.unwrap();
        RetrievalService::new(config, embedder, db).unwrap()
    }

    #[tokio::test]
    async fn test_query_before_index_is_uninitialized() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, Arc::new(HashingEmbedder::new(64).unwrap())).await;

        let result = svc.query("biology", "cells", 2).await;
        assert!(matches!(result, Err(AppError::Uninitialized(_))));
    }

    #[tokio::test]
    async fn test_ensure_builds_then_reuses() {
        let dir = TempDir::new().unwrap();
        write_corpus(&dir);
        let svc = service(&dir, Arc::new(HashingEmbedder::new(256).unwrap())).await;
        let corpus = dir.path().join("docs");

        let first = svc.ensure_index("biology", &corpus).await.unwrap();
        assert!(matches!(first, IndexSource::Built(ref r) if r.documents == 2 && r.chunks == 2));
        let second = svc.ensure_index("biology", &corpus).await.unwrap();
        assert!(matches!(second, IndexSource::Attached { chunks: 2 }));

        let context = svc.query("biology", "photosynthesis in plants", 1).await.unwrap();
        assert_eq!(context, "Chloroplasts carry out photosynthesis in plants.");
    }

    #[tokio::test]
    async fn test_context_joins_with_separator_and_bounds_k() {
        let dir = TempDir::new().unwrap();
        write_corpus(&dir);
        let svc = service(&dir, Arc::new(HashingEmbedder::new(256).unwrap())).await;

        let context = svc
            .get_context("the cell", 10, "biology", &dir.path().join("docs"))
            .await
            .unwrap();
        assert_eq!(context.matches(CONTEXT_SEPARATOR).count(), 1);
        assert!(context.starts_with("Mitochondria"));
    }

    #[tokio::test]
    async fn test_k_validation() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, Arc::new(HashingEmbedder::new(8).unwrap())).await;

        assert!(matches!(svc.checked_k(0), Err(AppError::InvalidInput(_))));
        assert_eq!(svc.checked_k(3).unwrap(), 3);
        assert_eq!(svc.checked_k(1000).unwrap(), svc.config().max_k);
    }

    #[tokio::test]
    async fn test_embedding_failure_writes_nothing() {
        let dir = TempDir::new().unwrap();
        write_corpus(&dir);
        let svc = service(&dir, Arc::new(FailingEmbedder)).await;

        let result = svc.ensure_index("biology", &dir.path().join("docs")).await;
        assert!(matches!(result, Err(AppError::Embedding(_))));

        let status = svc.status("biology").await.unwrap();
        assert!(!status.persisted);
        assert!(!status.attached);
    }

    #[tokio::test]
    async fn test_model_mismatch_is_index_corrupted() {
        let dir = TempDir::new().unwrap();
        write_corpus(&dir);
        let corpus = dir.path().join("docs");
        {
            let svc = service(&dir, Arc::new(HashingEmbedder::new(64).unwrap())).await;
            svc.ensure_index("biology", &corpus).await.unwrap();
        }

        let svc = service(&dir, Arc::new(HashingEmbedder::new(128).unwrap())).await;
        let result = svc.ensure_index("biology", &corpus).await;
        assert!(matches!(result, Err(AppError::IndexCorrupted(_))));

        let report = svc.rebuild("biology", &corpus).await.unwrap();
        assert_eq!(report.chunks, 2);
        assert!(svc.query("biology", "cell", 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_load_index_never_builds() {
        let dir = TempDir::new().unwrap();
        write_corpus(&dir);
        let svc = service(&dir, Arc::new(HashingEmbedder::new(64).unwrap())).await;

        let result = svc.load_index("chemistry").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(!svc.status("chemistry").await.unwrap().persisted);
    }

    #[tokio::test]
    async fn test_unknown_collections_leave_no_slots() {
        let dir = TempDir::new().unwrap();
        write_corpus(&dir);
        let svc = service(&dir, Arc::new(HashingEmbedder::new(64).unwrap())).await;

        for i in 0..1000 {
            let result = svc.load_index(&format!("missing-{}", i)).await;
            assert!(matches!(result, Err(AppError::NotFound(_))));
        }
        assert_eq!(svc.slots.lock().len(), 0);

        svc.ensure_index("biology", &dir.path().join("docs")).await.unwrap();
        assert_eq!(svc.slots.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_builds_leave_no_slots() {
        let dir = TempDir::new().unwrap();
        write_corpus(&dir);
        let svc = service(&dir, Arc::new(FailingEmbedder)).await;
        let corpus = dir.path().join("docs");

        assert!(svc.ensure_index("biology", &corpus).await.is_err());
        assert!(svc.rebuild("genetics", &corpus).await.is_err());
        assert!(svc.ensure_index("empty", &dir.path().join("nowhere")).await.is_err());
        assert!(svc.slots.lock().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_collection_name() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, Arc::new(HashingEmbedder::new(8).unwrap())).await;

        let result = svc.ensure_index("../etc", dir.path()).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_join_context() {
        let chunk = |text: &str| RetrievedChunk {
            text: text.to_string(),
            source: "a.txt".to_string(),
            chunk_index: 0,
            score: 1.0,
        };
        assert_eq!(join_context(&[]), "");
        assert_eq!(join_context(&[chunk("one")]), "one");
        assert_eq!(join_context(&[chunk("one"), chunk("two")]), "one\n\n---\n\ntwo");
    }
}
