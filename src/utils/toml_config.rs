//! TOML-based configuration for the tutor retrieval server
//!
//! Everything the server needs is declared in one file (`tutor.toml`): where the
//! corpus and the index live, how documents are chunked, which embedding model
//! to use, and where the HTTP listener binds. Every field has a default, so an
//! empty file is a valid configuration.
//!
//! Secrets never appear in the file itself. The file names an environment
//! variable (`auth.api_key_env`) and the value is read from the environment.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tutor_vector::{DistanceMetric, IndexKind};

/// Root configuration structure loaded from tutor.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    /// Corpus, chunking and index configuration
    #[serde(default)]
    pub rag: RagConfig,

    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Requests running longer than this are answered with 408
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

// ============= Authentication Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Environment variable name containing the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_api_key_env() -> String {
    "INTERNAL_API_KEY".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
        }
    }
}

// ============= RAG Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Directory holding one sub-directory per persisted collection
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,

    /// Folder of plain-text source documents
    #[serde(default = "default_corpus_dir")]
    pub corpus_dir: PathBuf,

    /// Collection used when a request does not name one
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Glob matched against file names in `corpus_dir`
    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Passages returned when a request does not set `k`
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Upper bound applied to any requested `k`
    #[serde(default = "default_max_k")]
    pub max_k: usize,

    #[serde(default)]
    pub metric: DistanceMetric,

    #[serde(default)]
    pub index_kind: IndexKind,
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("./data/index")
}

fn default_corpus_dir() -> PathBuf {
    PathBuf::from("./docs")
}

fn default_collection() -> String {
    "biology".to_string()
}

fn default_file_pattern() -> String {
    "*.txt".to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_k() -> usize {
    4
}

fn default_max_k() -> usize {
    20
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            index_dir: default_index_dir(),
            corpus_dir: default_corpus_dir(),
            collection: default_collection(),
            file_pattern: default_file_pattern(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            default_k: default_k(),
            max_k: default_max_k(),
            metric: DistanceMetric::default(),
            index_kind: IndexKind::default(),
        }
    }
}

// ============= Embedding Configuration =============

/// Which embedding backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Deterministic feature hashing, no model download
    #[default]
    Hashing,
    /// Remote model served by Ollama
    Ollama,
    /// Local ONNX model (requires the `local-embeddings` feature)
    Fastembed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingBackend,

    /// Vector length produced by the model
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Ollama server URL
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    /// Model name; each backend has its own default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Query embeddings kept in memory; 0 disables the cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Per-request timeout for remote backends
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_dimensions() -> usize {
    384
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_cache_capacity() -> usize {
    1024
}

fn default_embedding_timeout_secs() -> u64 {
    60
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::default(),
            dimensions: default_dimensions(),
            base_url: default_ollama_url(),
            model: None,
            cache_capacity: default_cache_capacity(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl AppConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for internal consistency.
    ///
    /// Environment variables are not checked here; see [`AppConfig::api_key`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rag = &self.rag;

        if rag.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "rag.chunk_size must be greater than 0".to_string(),
            ));
        }
        if rag.chunk_overlap >= rag.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                rag.chunk_overlap, rag.chunk_size
            )));
        }
        if rag.default_k == 0 {
            return Err(ConfigError::ValidationError(
                "rag.default_k must be greater than 0".to_string(),
            ));
        }
        if rag.max_k < rag.default_k {
            return Err(ConfigError::ValidationError(format!(
                "rag.max_k ({}) must be at least rag.default_k ({})",
                rag.max_k, rag.default_k
            )));
        }
        if rag.collection.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "rag.collection must not be empty".to_string(),
            ));
        }
        if let Err(e) = glob::Pattern::new(&rag.file_pattern) {
            return Err(ConfigError::ValidationError(format!(
                "rag.file_pattern '{}' is not a valid glob: {}",
                rag.file_pattern, e
            )));
        }
        if rag.index_kind == IndexKind::Hnsw && rag.metric == DistanceMetric::DotProduct {
            return Err(ConfigError::ValidationError(
                "rag.index_kind = \"hnsw\" does not support metric = \"dot_product\"".to_string(),
            ));
        }

        let embedding = &self.embedding;
        if embedding.dimensions == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimensions must be greater than 0".to_string(),
            ));
        }
        match embedding.provider {
            EmbeddingBackend::Hashing => {}
            EmbeddingBackend::Ollama => {
                if embedding.base_url.trim().is_empty() {
                    return Err(ConfigError::ValidationError(
                        "embedding.base_url is required for the ollama provider".to_string(),
                    ));
                }
            }
            EmbeddingBackend::Fastembed => {
                if !cfg!(feature = "local-embeddings") {
                    return Err(ConfigError::ValidationError(
                        "embedding.provider = \"fastembed\" requires the local-embeddings feature"
                            .to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    /// Get the API key from the environment
    pub fn api_key(&self) -> Result<String, ConfigError> {
        self.resolve_env(&self.auth.api_key_env)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(self.auth.api_key_env.clone()))
    }

    /// Address the HTTP server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
