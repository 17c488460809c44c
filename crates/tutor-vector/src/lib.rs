//! # tutor-vector
//!
//! An embedded, persistent vector index for retrieval-augmented generation.
//!
//! ## Features
//!
//! - **Pure Rust**: No native dependencies
//! - **Exact or approximate**: flat scan (exact top-k) or HNSW graphs per collection
//! - **Immutable collections**: built once, then searched concurrently without locks
//! - **Atomic persistence**: a collection is either fully on disk or not at all
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tutor_vector::{CollectionSpec, Config, Record, VectorDb, VectorIndex};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tutor_vector::Error> {
//!     let db = VectorDb::open(Config::persistent("./data/index")).await?;
//!     let index = VectorIndex::new(db);
//!
//!     let records = vec![Record::new("doc_0", "Cells divide by mitosis.", vec![0.1; 384])];
//!     index.build("biology", CollectionSpec::new(384), records).await?;
//!
//!     let results = index.search(&vec![0.1; 384], 4)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                      VectorDb                        │
//! │   attached collections (scc::HashMap<name, Arc<_>>)  │
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │                 Collection                     │  │
//! │  │  records (id, content, vector, metadata)       │  │
//! │  │  SearchIndex: Flat | Hnsw                      │  │
//! │  └────────────────────────────────────────────────┘  │
//! │   {root}/{name}/metadata.json + vectors.json         │
//! └──────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collection;
pub mod config;
pub mod distance;
pub mod error;
pub mod handle;
mod index;
pub mod persistence;
pub mod types;

// Re-exports for convenience
pub use collection::Collection;
pub use config::{Config, HnswConfig, IndexKind};
pub use distance::DistanceMetric;
pub use error::{Error, Result};
pub use handle::VectorIndex;
pub use types::{CollectionSpec, MetadataValue, Record, RecordId, SearchResult, VectorMetadata};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// The vector database: a root directory of named collections plus the
/// collections attached in this process.
///
/// # Thread Safety
///
/// `VectorDb` is cheap to clone and every operation takes `&self`. The map of
/// attached collections is an `scc::HashMap`, which is safe to use across
/// `.await` points. Collections themselves are immutable.
#[derive(Clone)]
pub struct VectorDb {
    inner: Arc<VectorDbInner>,
}

struct VectorDbInner {
    config: Config,
    collections: scc::HashMap<String, Arc<Collection>>,
}

impl VectorDb {
    /// Open a vector database with the given configuration.
    ///
    /// Nothing is read from disk here; collections are loaded on demand by
    /// [`VectorDb::load`].
    #[instrument(skip(config), fields(persistent = config.data_path.is_some()))]
    pub async fn open(config: Config) -> Result<Self> {
        if let Some(ref path) = config.data_path {
            tokio::fs::create_dir_all(path).await?;
        }
        info!("Opened vector database");

        Ok(Self {
            inner: Arc::new(VectorDbInner {
                config,
                collections: scc::HashMap::new(),
            }),
        })
    }

    /// Root directory, if persistent.
    pub fn data_path(&self) -> Option<&Path> {
        self.inner.config.data_path.as_deref()
    }

    /// Check whether a collection exists, attached or on disk.
    pub async fn exists(&self, name: &str) -> Result<bool> {
        validate_collection_name(name)?;
        if self.inner.collections.contains(name) {
            return Ok(true);
        }
        match self.data_path() {
            Some(path) => persistence::collection_exists(path, name).await,
            None => Ok(false),
        }
    }

    /// Build and persist a new collection.
    ///
    /// # Errors
    ///
    /// [`Error::CollectionExists`] if `name` is attached or persisted already;
    /// validation errors from [`Collection::new`]. Nothing is written on error.
    #[instrument(skip(self, spec, records), fields(count = records.len()))]
    pub async fn build(
        &self,
        name: &str,
        spec: CollectionSpec,
        records: Vec<Record>,
    ) -> Result<Arc<Collection>> {
        if self.exists(name).await? {
            return Err(Error::CollectionExists(name.to_string()));
        }

        let collection = Arc::new(Collection::new(
            name,
            spec,
            records,
            self.inner.config.hnsw_config.clone(),
        )?);

        if let Some(path) = self.data_path() {
            persistence::save_collection(path, &collection, false).await?;
        }

        if self
            .inner
            .collections
            .insert(name.to_string(), collection.clone())
            .is_err()
        {
            return Err(Error::CollectionExists(name.to_string()));
        }

        info!(name, count = collection.len(), "Built collection");
        Ok(collection)
    }

    /// Build and persist a collection, replacing any existing one with that name.
    #[instrument(skip(self, spec, records), fields(count = records.len()))]
    pub async fn rebuild(
        &self,
        name: &str,
        spec: CollectionSpec,
        records: Vec<Record>,
    ) -> Result<Arc<Collection>> {
        validate_collection_name(name)?;
        let collection = Arc::new(Collection::new(
            name,
            spec,
            records,
            self.inner.config.hnsw_config.clone(),
        )?);

        if let Some(path) = self.data_path() {
            persistence::save_collection(path, &collection, true).await?;
        }

        self.inner.collections.remove(name);
        let _ = self.inner.collections.insert(name.to_string(), collection.clone());

        info!(name, count = collection.len(), "Rebuilt collection");
        Ok(collection)
    }

    /// Attach to a collection, reading it from disk if it is not attached yet.
    ///
    /// # Errors
    ///
    /// [`Error::CollectionNotFound`] if it does not exist;
    /// [`Error::Corrupted`] if it exists on disk but cannot be read.
    #[instrument(skip(self))]
    pub async fn load(&self, name: &str) -> Result<Arc<Collection>> {
        validate_collection_name(name)?;
        if let Some(collection) = self.inner.collections.read(name, |_, v| v.clone()) {
            debug!("Collection already attached");
            return Ok(collection);
        }

        let Some(path) = self.data_path() else {
            return Err(Error::CollectionNotFound(name.to_string()));
        };

        let collection = Arc::new(persistence::load_collection(path, name).await?);
        // a concurrent loader may have won; keep whichever got in first
        match self.inner.collections.insert(name.to_string(), collection.clone()) {
            Ok(()) => Ok(collection),
            Err(_) => self.get_collection(name),
        }
    }

    /// Get an attached collection.
    pub fn get_collection(&self, name: &str) -> Result<Arc<Collection>> {
        self.inner
            .collections
            .read(name, |_, v| v.clone())
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
    }

    /// Delete a collection from memory and disk.
    #[instrument(skip(self))]
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        validate_collection_name(name)?;
        let attached = self.inner.collections.remove(name).is_some();
        let on_disk = match self.data_path() {
            Some(path) => persistence::delete_collection(path, name).await?,
            None => false,
        };

        if !attached && !on_disk {
            return Err(Error::CollectionNotFound(name.to_string()));
        }
        info!(name, "Deleted collection");
        Ok(())
    }

    /// List all collection names, attached or on disk, sorted.
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names = match self.data_path() {
            Some(path) => persistence::list_collections(path).await?,
            None => Vec::new(),
        };
        self.inner.collections.scan(|k, _| {
            names.push(k.clone());
        });
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Search an attached collection.
    pub fn search(&self, collection: &str, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.get_collection(collection)?.search(query, k)
    }
}

/// Check that `name` can be used as a collection name.
///
/// Names become directory names: ASCII letters, digits, `_`, `-` and `.`, not
/// starting with `.`, at most 128 bytes.
pub fn validate_collection_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 128
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "Invalid collection name '{}': use letters, digits, '_', '-' or '.'",
            name
        )))
    }
}

/// Statistics about a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Name of the collection.
    pub name: String,
    /// Number of vectors in the collection.
    pub vector_count: usize,
    /// Dimensionality of vectors.
    pub dimensions: usize,
    /// Distance metric used.
    pub metric: DistanceMetric,
    /// Search structure used.
    pub kind: IndexKind,
    /// Embedding model the vectors came from.
    pub model_id: Option<String>,
    /// Approximate memory usage in bytes.
    pub memory_bytes: usize,
    /// Build time.
    pub created_at: DateTime<Utc>,
}
