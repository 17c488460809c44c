//! Retrieval pipeline
//!
//! Grounds tutor answers in a biology corpus by finding the passages most
//! similar to a learner's question.
//!
//! # Module Structure
//!
//! - [`rag::loader`](crate::rag::loader) - Reads UTF-8 documents from the corpus folder
//! - [`rag::chunker`](crate::rag::chunker) - Overlapping, character-based chunking
//! - [`rag::embeddings`](crate::rag::embeddings) - Embedder trait and backends (hashing, Ollama, fastembed)
//! - [`rag::cache`](crate::rag::cache) - LRU cache in front of an embedder
//! - [`rag::service`](crate::rag::service) - Load-or-build orchestration and queries
//!
//! # Pipeline
//!
//! 1. **Ingestion** - Documents are loaded, chunked and embedded in one batch
//! 2. **Storage** - Vectors are persisted as a named collection in the index directory
//! 3. **Retrieval** - The query is embedded and the top-k chunks are returned, best first
//!
//! # Example
//!
//! ```ignore
//! use tutor::rag::RetrievalService;
//!
//! let service = RetrievalService::from_config(&config).await?;
//! service.ensure_index("biology", Path::new("./docs")).await?;
//! let context = service.query("biology", "What do mitochondria do?", 4).await?;
//! ```

pub mod cache;
pub mod chunker;
pub mod embeddings;
pub mod loader;
pub mod service;

pub use cache::{CacheStats, CachedEmbedder};
pub use chunker::{TextChunk, TextChunker};
pub use embeddings::{Embedder, EmbeddingProvider, HashingEmbedder, OllamaEmbedder};
pub use loader::{load_documents, load_documents_from_folder};
pub use service::{join_context, RetrievalService, CONTEXT_SEPARATOR};
