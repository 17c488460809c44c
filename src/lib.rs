//! # Tutor Server - Retrieval for a biology tutor
//!
//! Finds the passages of a biology corpus most relevant to a learner's
//! question, so a tutor model can ground its answer in them.
//!
//! ## Overview
//!
//! The crate can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `tutor-server` binary
//! 2. **As a library** - Use [`RetrievalService`] directly
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use std::path::Path;
//! use tutor::{AppConfig, RetrievalService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load("tutor.toml")?;
//!     let service = RetrievalService::from_config(&config).await?;
//!
//!     // Loads the persisted index, or builds it from ./docs the first time
//!     service.ensure_index("biology", Path::new("./docs")).await?;
//!
//!     let context = service.query("biology", "How do cells make ATP?", 4).await?;
//!     println!("{}", context);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `local-embeddings` | Local ONNX embeddings via fastembed |
//!
//! ## Modules
//!
//! - [`api`] - REST API handlers and routes
//! - [`cli`] - Command-line interface
//! - [`rag`] - Loader, chunker, embedders and the retrieval service
//! - [`types`] - Common types and error handling
//! - [`utils`] - TOML configuration

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface.
pub mod cli;
/// Retrieval pipeline components.
pub mod rag;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export commonly used types
pub use rag::{Embedder, EmbeddingProvider, RetrievalService};
pub use types::{AppError, Result};
pub use utils::toml_config::{AppConfig, ConfigError};

use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Effective configuration
    pub config: Arc<AppConfig>,
    /// Retrieval service for all collections
    pub retrieval: Arc<RetrievalService>,
    /// Secret expected in the `x-api-key` header
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        retrieval: RetrievalService,
        api_key: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            retrieval: Arc::new(retrieval),
            api_key: api_key.into(),
        }
    }
}
