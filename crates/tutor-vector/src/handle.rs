//! Single-collection index handle.
//!
//! [`VectorIndex`] is what the retrieval pipeline holds: it starts detached,
//! becomes attached through `build`, `rebuild` or `load`, and refuses to search
//! until then. An unattached search is [`Error::Uninitialized`], never an empty
//! result set.

use crate::collection::Collection;
use crate::error::{Error, Result};
use crate::types::{CollectionSpec, Record, SearchResult};
use crate::VectorDb;
use parking_lot::RwLock;
use std::sync::Arc;

/// Handle over at most one collection of a [`VectorDb`].
pub struct VectorIndex {
    db: VectorDb,
    attached: RwLock<Option<Arc<Collection>>>,
}

impl VectorIndex {
    /// Create a detached handle.
    pub fn new(db: VectorDb) -> Self {
        Self {
            db,
            attached: RwLock::new(None),
        }
    }

    /// Build and persist a fresh collection, then attach to it.
    ///
    /// Fails with [`Error::CollectionExists`] if `name` is already present.
    pub async fn build(
        &self,
        name: &str,
        spec: CollectionSpec,
        records: Vec<Record>,
    ) -> Result<Arc<Collection>> {
        let collection = self.db.build(name, spec, records).await?;
        self.attach(collection.clone());
        Ok(collection)
    }

    /// Build and persist a collection, replacing any existing one, then attach.
    pub async fn rebuild(
        &self,
        name: &str,
        spec: CollectionSpec,
        records: Vec<Record>,
    ) -> Result<Arc<Collection>> {
        let collection = self.db.rebuild(name, spec, records).await?;
        self.attach(collection.clone());
        Ok(collection)
    }

    /// Attach to an existing collection.
    pub async fn load(&self, name: &str) -> Result<Arc<Collection>> {
        let collection = self.db.load(name).await?;
        self.attach(collection.clone());
        Ok(collection)
    }

    /// Attach to an already constructed collection.
    pub fn attach(&self, collection: Arc<Collection>) {
        *self.attached.write() = Some(collection);
    }

    /// Drop the attachment.
    pub fn detach(&self) {
        *self.attached.write() = None;
    }

    /// Whether a collection is attached.
    pub fn is_initialized(&self) -> bool {
        self.attached.read().is_some()
    }

    /// The attached collection.
    pub fn collection(&self) -> Result<Arc<Collection>> {
        self.attached.read().clone().ok_or(Error::Uninitialized)
    }

    /// Number of records in the attached collection.
    pub fn len(&self) -> Result<usize> {
        Ok(self.collection()?.len())
    }

    /// Search the attached collection.
    ///
    /// The read lock is held only long enough to clone the `Arc`, so searches
    /// run concurrently with each other and with a re-attach.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.collection()?.search(query, k)
    }
}
