//! HTTP API Handlers and Routes
//!
//! A thin axum layer over [`RetrievalService`](crate::rag::RetrievalService).
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::middleware`](crate::api::middleware) - API key check for protected routes
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//!
//! # API Endpoints
//!
//! ## Health
//! - `GET /ping` - Liveness probe
//! - `GET /health` - Status and version
//!
//! ## Retrieval (`/rag`)
//! - `POST /rag/context` - Context string for a query
//! - `POST /rag/search` - Scored passages for a query
//! - `POST /rag/rebuild` - Rebuild a collection from the corpus
//! - `GET /rag/status/{collection}` - Attached/persisted state of a collection
//!
//! # Authentication
//!
//! `/rag` endpoints require the shared secret in the `x-api-key` header:
//! ```text
//! x-api-key: <secret>
//! ```

/// Request handlers for all API endpoints.
pub mod handlers;
/// API key middleware.
pub mod middleware;
/// Router configuration and route definitions.
pub mod routes;
