//! Vector collection.
//!
//! A collection is a named, immutable set of records sharing one
//! dimensionality and metric. It is built once and then only read, which lets
//! any number of concurrent searches share it through an `Arc` without locking.

use crate::config::{HnswConfig, IndexKind};
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::index::SearchIndex;
use crate::types::{CollectionSpec, Record, SearchResult};
use crate::CollectionStats;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A named collection of records.
pub struct Collection {
    name: String,
    spec: CollectionSpec,
    records: Vec<Record>,
    /// Record id -> position in `records`.
    positions: HashMap<String, usize>,
    index: SearchIndex,
    hnsw_config: HnswConfig,
    created_at: DateTime<Utc>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("spec", &self.spec)
            .field("len", &self.records.len())
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl Collection {
    /// Build a collection from `records`.
    ///
    /// # Errors
    ///
    /// Fails if the spec has zero dimensions, a record has the wrong
    /// dimensionality or non-finite values, or two records share an id.
    pub fn new(
        name: impl Into<String>,
        spec: CollectionSpec,
        records: Vec<Record>,
        hnsw_config: HnswConfig,
    ) -> Result<Self> {
        Self::with_created_at(name.into(), spec, records, hnsw_config, Utc::now())
    }

    pub(crate) fn with_created_at(
        name: String,
        spec: CollectionSpec,
        records: Vec<Record>,
        hnsw_config: HnswConfig,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        if spec.dimensions == 0 {
            return Err(Error::InvalidVector("Dimensions must be > 0".to_string()));
        }

        let mut positions = HashMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            validate_vector(&record.vector, spec.dimensions)?;
            if positions.insert(record.id.clone(), position).is_some() {
                return Err(Error::InvalidArgument(format!(
                    "Duplicate record id '{}'",
                    record.id
                )));
            }
        }

        let index = {
            let vectors: Vec<&[f32]> = records.iter().map(|r| r.vector.as_slice()).collect();
            SearchIndex::build(spec.kind, spec.metric, &vectors, &hnsw_config)?
        };

        Ok(Self {
            name,
            spec,
            records,
            positions,
            index,
            hnsw_config,
            created_at,
        })
    }

    /// Get the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the spec the collection was built with.
    pub fn spec(&self) -> &CollectionSpec {
        &self.spec
    }

    /// Get the vector dimensions.
    pub fn dimensions(&self) -> usize {
        self.spec.dimensions
    }

    /// Get the distance metric.
    pub fn metric(&self) -> DistanceMetric {
        self.spec.metric
    }

    /// Get the search structure in use.
    pub fn kind(&self) -> IndexKind {
        self.index.kind()
    }

    /// Id of the embedding model recorded at build time.
    pub fn model_id(&self) -> Option<&str> {
        self.spec.model_id.as_deref()
    }

    /// When the collection was built.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in insertion order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Get a record by id.
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.positions.get(id).map(|&p| &self.records[p])
    }

    /// Check if a record exists.
    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// HNSW parameters (used only by [`IndexKind::Hnsw`] collections).
    pub fn hnsw_config(&self) -> &HnswConfig {
        &self.hnsw_config
    }

    /// Search for the `k` most similar records, best first.
    ///
    /// Returns `min(k, len)` results for flat collections.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `k == 0`; `DimensionMismatch` / `InvalidVector` if
    /// the query cannot be compared against this collection.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be a positive integer".to_string()));
        }
        validate_vector(query, self.spec.dimensions)?;

        if self.records.is_empty() {
            return Ok(Vec::new());
        }

        let vectors: Vec<&[f32]> = self.records.iter().map(|r| r.vector.as_slice()).collect();
        let hits = self
            .index
            .search(self.spec.metric, &vectors, query, k, &self.hnsw_config);

        Ok(hits
            .into_iter()
            .map(|(position, score)| {
                let record = &self.records[position];
                SearchResult {
                    id: record.id.clone(),
                    score,
                    content: record.content.clone(),
                    metadata: record.metadata.clone(),
                }
            })
            .collect())
    }

    /// Search, keeping only results scoring at least `min_score`.
    pub fn search_with_threshold(
        &self,
        query: &[f32],
        k: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        Ok(self
            .search(query, k)?
            .into_iter()
            .filter(|r| r.score >= min_score)
            .collect())
    }

    /// Approximate memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        let vector_bytes = self.records.len() * self.spec.dimensions * std::mem::size_of::<f32>();
        let content_bytes: usize = self.records.iter().map(|r| r.content.len() + r.id.len()).sum();
        let graph_bytes = match self.index.kind() {
            IndexKind::Flat => 0,
            IndexKind::Hnsw => {
                self.records.len() * self.hnsw_config.m * 2 * std::mem::size_of::<usize>()
            }
        };
        vector_bytes + content_bytes + graph_bytes
    }

    /// Get collection statistics.
    pub fn stats(&self) -> CollectionStats {
        CollectionStats {
            name: self.name.clone(),
            vector_count: self.records.len(),
            dimensions: self.spec.dimensions,
            metric: self.spec.metric,
            kind: self.index.kind(),
            model_id: self.spec.model_id.clone(),
            memory_bytes: self.memory_usage(),
            created_at: self.created_at,
        }
    }
}

fn validate_vector(vector: &[f32], dimensions: usize) -> Result<()> {
    if vector.len() != dimensions {
        return Err(Error::DimensionMismatch {
            expected: dimensions,
            actual: vector.len(),
        });
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidVector("Vector contains NaN or Inf".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VectorMetadata;

    fn sample_records() -> Vec<Record> {
        vec![
            Record::new("a_0", "cells divide", vec![1.0, 0.0, 0.0]),
            Record::new("a_1", "genes encode", vec![0.0, 1.0, 0.0]),
            Record::new("b_0", "cells grow", vec![0.9, 0.1, 0.0])
                .with_metadata(VectorMetadata::from_pairs([("source", "b.txt")])),
        ]
    }

    fn collection() -> Collection {
        Collection::new(
            "bio",
            CollectionSpec::new(3),
            sample_records(),
            HnswConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_collection_basic() {
        let col = collection();
        assert_eq!(col.name(), "bio");
        assert_eq!(col.dimensions(), 3);
        assert_eq!(col.metric(), DistanceMetric::Cosine);
        assert_eq!(col.kind(), IndexKind::Flat);
        assert_eq!(col.len(), 3);
        assert!(col.contains("a_1"));
        assert_eq!(col.get("b_0").unwrap().content, "cells grow");
    }

    #[test]
    fn test_self_retrieval_is_top_hit() {
        let col = collection();
        for record in col.records() {
            let results = col.search(&record.vector, 1).unwrap();
            assert_eq!(results[0].id, record.id);
        }
    }

    #[test]
    fn test_search_returns_min_k_len() {
        let col = collection();
        assert_eq!(col.search(&[1.0, 0.0, 0.0], 2).unwrap().len(), 2);
        assert_eq!(col.search(&[1.0, 0.0, 0.0], 10).unwrap().len(), 3);
    }

    #[test]
    fn test_search_rejects_zero_k_and_bad_query() {
        let col = collection();
        assert!(matches!(col.search(&[1.0, 0.0, 0.0], 0), Err(Error::InvalidArgument(_))));
        assert!(matches!(col.search(&[1.0, 0.0], 1), Err(Error::DimensionMismatch { .. })));
        assert!(matches!(col.search(&[f32::NAN, 0.0, 0.0], 1), Err(Error::InvalidVector(_))));
    }

    #[test]
    fn test_empty_collection_searches_to_nothing() {
        let col = Collection::new(
            "empty",
            CollectionSpec::new(3),
            Vec::new(),
            HnswConfig::default(),
        )
        .unwrap();
        assert!(col.is_empty());
        assert!(col.search(&[1.0, 0.0, 0.0], 4).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_bad_records() {
        let wrong_dims = vec![Record::new("x", "x", vec![1.0, 0.0])];
        assert!(matches!(
            Collection::new("c", CollectionSpec::new(3), wrong_dims, HnswConfig::default()),
            Err(Error::DimensionMismatch { expected: 3, actual: 2 })
        ));

        let duplicate = vec![
            Record::new("x", "x", vec![1.0, 0.0]),
            Record::new("x", "y", vec![0.0, 1.0]),
        ];
        assert!(matches!(
            Collection::new("c", CollectionSpec::new(2), duplicate, HnswConfig::default()),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_threshold_and_stats() {
        let col = collection();
        let results = col.search_with_threshold(&[1.0, 0.0, 0.0], 3, 0.5).unwrap();
        assert_eq!(results.len(), 2);

        let stats = col.stats();
        assert_eq!(stats.vector_count, 3);
        assert_eq!(stats.dimensions, 3);
        assert!(stats.memory_bytes > 0);
    }
}
