//! API request handlers.

/// Liveness and health handlers.
pub mod health;
/// Retrieval handlers.
pub mod rag;
