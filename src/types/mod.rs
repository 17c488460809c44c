use serde::{Deserialize, Serialize};
use tutor_vector::CollectionStats;

// ============= API Request/Response Types =============

/// Body of `POST /rag/context`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextResponse {
    /// Retrieved passages joined in rank order.
    pub context: String,
    /// Number of passages in `context`.
    pub passages: usize,
}

/// Body of `POST /rag/search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<RetrievedChunk>,
}

/// Body of `POST /rag/rebuild`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RebuildRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// ============= Retrieval Types =============

/// A source document read from the corpus. Discarded once chunked.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub content: String,
    /// Path the document was read from.
    pub source: String,
}

/// A file the loader could not read. Reported, never fatal on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Outcome of reading a corpus folder.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedFile>,
}

/// One chunk returned by a scored retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub source: String,
    pub chunk_index: usize,
    pub score: f32,
}

/// Summary of a collection built from the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub collection: String,
    pub documents: usize,
    pub chunks: usize,
    pub skipped: Vec<SkippedFile>,
}

/// Where `ensure_index` got its collection from.
#[derive(Debug, Clone)]
pub enum IndexSource {
    /// Already attached in this process.
    Attached { chunks: usize },
    /// Read back from the index directory.
    Loaded { chunks: usize },
    /// Built from the corpus because nothing was persisted.
    Built(BuildReport),
}

impl IndexSource {
    /// Number of chunks in the collection.
    pub fn chunks(&self) -> usize {
        match self {
            IndexSource::Attached { chunks } | IndexSource::Loaded { chunks } => *chunks,
            IndexSource::Built(report) => report.chunks,
        }
    }
}

/// Response of `GET /rag/status/{collection}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStatus {
    pub collection: String,
    /// Attached to this process and ready to search.
    pub attached: bool,
    /// Present in the index directory.
    pub persisted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<CollectionStats>,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Index not initialized: {0}")]
    Uninitialized(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Index corrupted: {0}")]
    IndexCorrupted(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tutor_vector::Error> for AppError {
    fn from(err: tutor_vector::Error) -> Self {
        use tutor_vector::Error;

        match err {
            Error::CollectionNotFound(name) => {
                AppError::NotFound(format!("Collection '{}' not found", name))
            }
            Error::Corrupted { .. } | Error::DimensionMismatch { .. } => {
                AppError::IndexCorrupted(err.to_string())
            }
            Error::InvalidVector(msg) => AppError::Embedding(msg),
            Error::InvalidArgument(msg) => AppError::InvalidInput(msg),
            Error::Uninitialized => {
                AppError::Uninitialized("search called before the index was built or loaded".into())
            }
            Error::CollectionExists(_)
            | Error::Index(_)
            | Error::Persistence(_)
            | Error::Io(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<crate::utils::toml_config::ConfigError> for AppError {
    fn from(err: crate::utils::toml_config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, message) = match self {
            AppError::Configuration(msg) => {
                tracing::error!(error = %msg, "Configuration error while serving request");
                (StatusCode::INTERNAL_SERVER_ERROR, "Service is misconfigured".to_string())
            }
            AppError::Uninitialized(msg) => {
                tracing::error!(error = %msg, "Index used before initialization");
                (StatusCode::SERVICE_UNAVAILABLE, "Index is not ready".to_string())
            }
            AppError::Embedding(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::IndexCorrupted(msg) => (StatusCode::CONFLICT, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn test_vector_errors_map_onto_taxonomy() {
        let corrupted: AppError = tutor_vector::Error::Corrupted {
            name: "bio".into(),
            reason: "bad json".into(),
        }
        .into();
        assert!(matches!(corrupted, AppError::IndexCorrupted(_)));

        let missing: AppError = tutor_vector::Error::CollectionNotFound("bio".into()).into();
        assert!(matches!(missing, AppError::NotFound(_)));

        let uninit: AppError = tutor_vector::Error::Uninitialized.into();
        assert!(matches!(uninit, AppError::Uninitialized(_)));

        let bad_k: AppError = tutor_vector::Error::InvalidArgument("k".into()).into();
        assert!(matches!(bad_k, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Auth("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::IndexCorrupted("x".into()), StatusCode::CONFLICT),
            (AppError::Uninitialized("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
