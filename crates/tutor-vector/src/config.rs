//! Configuration for tutor-vector.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the vector database.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Directory holding one sub-directory per collection. If None, collections
    /// live in memory only and vanish with the process.
    pub data_path: Option<PathBuf>,

    /// Parameters used when a collection is built with [`IndexKind::Hnsw`].
    pub hnsw_config: HnswConfig,
}

impl Config {
    /// Create an in-memory configuration.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Create a persistent configuration rooted at `path`.
    pub fn persistent<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            data_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Set the HNSW configuration.
    pub fn with_hnsw_config(mut self, config: HnswConfig) -> Self {
        self.hnsw_config = config;
        self
    }
}

/// Search structure used by a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Exact scan over every stored vector. Results are the true top-k.
    #[default]
    Flat,
    /// Approximate HNSW graph. Faster on large collections, may miss neighbours.
    Hnsw,
}

impl std::str::FromStr for IndexKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flat" | "exact" => Ok(IndexKind::Flat),
            "hnsw" => Ok(IndexKind::Hnsw),
            _ => Err(format!("Unknown index kind: {}", s)),
        }
    }
}

/// HNSW index configuration.
///
/// These parameters control the trade-off between search accuracy,
/// speed, and memory usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Maximum number of connections per element per layer.
    ///
    /// Typical values: 12-48. Default: 16.
    pub m: usize,

    /// Size of the dynamic candidate list during construction.
    ///
    /// Typical values: 100-500. Default: 200.
    pub ef_construction: usize,

    /// Size of the dynamic candidate list during search. Raised to `k`
    /// when a search asks for more results.
    pub ef_search: usize,

    /// Insert the initial batch with multiple threads.
    pub parallel_construction: bool,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 100,
            parallel_construction: true,
        }
    }
}

impl HnswConfig {
    /// Higher recall at the cost of build time and memory.
    pub fn accurate() -> Self {
        Self {
            m: 32,
            ef_construction: 400,
            ef_search: 200,
            parallel_construction: true,
        }
    }

    /// Set the ef_search parameter.
    pub fn with_ef_search(mut self, ef: usize) -> Self {
        self.ef_search = ef;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_config() {
        let config = Config::memory();
        assert!(config.data_path.is_none());
    }

    #[test]
    fn test_persistent_config() {
        let config = Config::persistent("/tmp/vectors");
        assert_eq!(config.data_path, Some(PathBuf::from("/tmp/vectors")));
    }

    #[test]
    fn test_index_kind_parse() {
        assert_eq!("flat".parse::<IndexKind>().unwrap(), IndexKind::Flat);
        assert_eq!("HNSW".parse::<IndexKind>().unwrap(), IndexKind::Hnsw);
        assert!("ivf".parse::<IndexKind>().is_err());
    }

    #[test]
    fn test_hnsw_presets() {
        let default = HnswConfig::default();
        let accurate = HnswConfig::accurate();
        assert!(default.m < accurate.m);
        assert!(default.ef_construction < accurate.ef_construction);
    }
}
