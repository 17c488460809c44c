//! Search structures over a collection's vectors.
//!
//! A collection is immutable once built, so both structures are constructed in
//! one pass and only read afterwards. `Flat` scores every vector and returns the
//! exact top-k; `Hnsw` wraps the hnsw_rs graph for large collections.

use crate::config::{HnswConfig, IndexKind};
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use anndists::dist::distances::{DistCosine, DistL1, DistL2};
use hnsw_rs::hnsw::Hnsw;
use std::cmp::Ordering;
use tracing::debug;

/// hnsw_rs caps the number of layers at 16.
const MAX_LAYER: usize = 16;

/// Search structure over the vectors of one collection.
pub(crate) enum SearchIndex {
    Flat,
    Hnsw(HnswGraph),
}

/// Type-erased HNSW graph. The numeric id of a point is its position in the
/// collection's record list.
pub(crate) enum HnswGraph {
    Cosine(Hnsw<'static, f32, DistCosine>),
    Euclidean(Hnsw<'static, f32, DistL2>),
    Manhattan(Hnsw<'static, f32, DistL1>),
}

impl SearchIndex {
    /// Build the structure for `vectors`.
    pub(crate) fn build(
        kind: IndexKind,
        metric: DistanceMetric,
        vectors: &[&[f32]],
        config: &HnswConfig,
    ) -> Result<Self> {
        match kind {
            IndexKind::Flat => Ok(SearchIndex::Flat),
            IndexKind::Hnsw => Ok(SearchIndex::Hnsw(HnswGraph::build(metric, vectors, config)?)),
        }
    }

    pub(crate) fn kind(&self) -> IndexKind {
        match self {
            SearchIndex::Flat => IndexKind::Flat,
            SearchIndex::Hnsw(_) => IndexKind::Hnsw,
        }
    }

    /// Top-`k` `(position, score)` pairs, best first.
    pub(crate) fn search(
        &self,
        metric: DistanceMetric,
        vectors: &[&[f32]],
        query: &[f32],
        k: usize,
        config: &HnswConfig,
    ) -> Vec<(usize, f32)> {
        match self {
            SearchIndex::Flat => flat_top_k(metric, vectors, query, k),
            SearchIndex::Hnsw(graph) => {
                let ef_search = config.ef_search.max(k);
                // the graph only nominates candidates; scores match the flat scan
                let mut hits: Vec<(usize, f32)> = graph
                    .neighbours(query, k, ef_search)
                    .into_iter()
                    .filter_map(|(position, _)| {
                        let vector = vectors.get(position)?;
                        Some((position, metric.similarity(query, vector)))
                    })
                    .collect();
                hits.sort_by(rank_order);
                hits.truncate(k);
                hits
            }
        }
    }
}

/// Best score first; equal scores keep insertion order.
fn rank_order(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

/// Exact top-k by scanning every vector.
fn flat_top_k(
    metric: DistanceMetric,
    vectors: &[&[f32]],
    query: &[f32],
    k: usize,
) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = vectors
        .iter()
        .enumerate()
        .map(|(position, vector)| (position, metric.similarity(query, vector)))
        .collect();

    if k < scored.len() {
        scored.select_nth_unstable_by(k - 1, rank_order);
        scored.truncate(k);
    }
    scored.sort_by(rank_order);
    scored
}

impl HnswGraph {
    fn build(metric: DistanceMetric, vectors: &[&[f32]], config: &HnswConfig) -> Result<Self> {
        let max_elements = vectors.len().max(1);
        let data: Vec<(&[f32], usize)> = vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| (*vector, position))
            .collect();

        let graph = match metric {
            DistanceMetric::Cosine => {
                let hnsw = Hnsw::new(
                    config.m,
                    max_elements,
                    MAX_LAYER,
                    config.ef_construction,
                    DistCosine {},
                );
                insert_all(&hnsw, &data, config.parallel_construction);
                HnswGraph::Cosine(hnsw)
            }
            DistanceMetric::Euclidean => {
                let hnsw = Hnsw::new(
                    config.m,
                    max_elements,
                    MAX_LAYER,
                    config.ef_construction,
                    DistL2 {},
                );
                insert_all(&hnsw, &data, config.parallel_construction);
                HnswGraph::Euclidean(hnsw)
            }
            DistanceMetric::Manhattan => {
                let hnsw = Hnsw::new(
                    config.m,
                    max_elements,
                    MAX_LAYER,
                    config.ef_construction,
                    DistL1 {},
                );
                insert_all(&hnsw, &data, config.parallel_construction);
                HnswGraph::Manhattan(hnsw)
            }
            // anndists' dot distance requires unit vectors; use Flat for raw dot products
            DistanceMetric::DotProduct => {
                return Err(Error::InvalidArgument(
                    "HNSW index does not support the dot_product metric; use a flat index"
                        .to_string(),
                ));
            }
        };

        debug!(count = vectors.len(), ?metric, "Built HNSW graph");
        Ok(graph)
    }

    /// Candidate `(position, distance)` pairs from the graph.
    fn neighbours(&self, query: &[f32], k: usize, ef_search: usize) -> Vec<(usize, f32)> {
        let found = match self {
            HnswGraph::Cosine(hnsw) => hnsw.search(query, k, ef_search),
            HnswGraph::Euclidean(hnsw) => hnsw.search(query, k, ef_search),
            HnswGraph::Manhattan(hnsw) => hnsw.search(query, k, ef_search),
        };
        found.into_iter().map(|n| (n.d_id, n.distance)).collect()
    }
}

fn insert_all<D>(hnsw: &Hnsw<'static, f32, D>, data: &[(&[f32], usize)], parallel: bool)
where
    D: anndists::dist::Distance<f32> + Send + Sync,
{
    if parallel && data.len() > 1 {
        let owned: Vec<(Vec<f32>, usize)> =
            data.iter().map(|(v, id)| (v.to_vec(), *id)).collect();
        let refs: Vec<(&Vec<f32>, usize)> = owned.iter().map(|(v, id)| (v, *id)).collect();
        hnsw.parallel_insert(&refs);
    } else {
        for (vector, id) in data {
            hnsw.insert((*vector, *id));
        }
    }
}
