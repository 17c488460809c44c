mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use common::mocks::CountingEmbedder;
use common::Fixture;
use serde_json::{json, Value};
use std::sync::Arc;
use tutor::{
    types::{BuildReport, CollectionStatus, ContextResponse, HealthResponse, SearchResponse},
    utils::toml_config::AppConfig,
    AppState,
};

const API_KEY: &str = "test-secret";

fn api_key_header() -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-api-key"),
        HeaderValue::from_static(API_KEY),
    )
}

/// Create a test server over a fresh two-document corpus.
///
/// The fixture owns the temporary directories and must outlive the server.
async fn create_test_server() -> (TestServer, Fixture, Arc<CountingEmbedder>) {
    let fixture = Fixture::new();
    fixture.write_two_document_corpus();

    let embedder = Arc::new(CountingEmbedder::new(2048));
    let retrieval = fixture.service(embedder.clone()).await;
    let config = AppConfig {
        rag: fixture.rag_config(),
        ..AppConfig::default()
    };

    let state = AppState::new(config, retrieval, API_KEY);
    let app = tutor::api::routes::create_router(state);
    let server = TestServer::new(app).expect("Failed to create test server");
    (server, fixture, embedder)
}

// ============= Health Check Tests =============

#[tokio::test]
async fn test_ping() {
    let (server, _fixture, _) = create_test_server().await;

    let response = server.get("/ping").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "message": "pong" }));
}

#[tokio::test]
async fn test_health_check() {
    let (server, _fixture, _) = create_test_server().await;

    let response = server.get("/health").await;
    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

// ============= Authentication Tests =============

#[tokio::test]
async fn test_rag_routes_require_api_key() {
    let (server, _fixture, embedder) = create_test_server().await;

    let response = server
        .post("/rag/context")
        .json(&json!({ "query": "w0001" }))
        .await;
    response.assert_status_unauthorized();

    let (name, _) = api_key_header();
    let response = server
        .post("/rag/context")
        .add_header(name, HeaderValue::from_static("wrong"))
        .json(&json!({ "query": "w0001" }))
        .await;
    response.assert_status_unauthorized();
    let body: Value = response.json();
    assert!(body["error"].is_string());

    // rejected before any retrieval work
    assert_eq!(embedder.batch_calls(), 0);
}

// ============= Retrieval Tests =============

#[tokio::test]
async fn test_context_builds_index_on_first_request() {
    let (server, fixture, embedder) = create_test_server().await;
    let (name, value) = api_key_header();

    let response = server
        .post("/rag/context")
        .add_header(name, value)
        .json(&json!({ "query": "w0000 w0001 w0002 w0003", "k": 1 }))
        .await;
    response.assert_status_ok();

    let context: ContextResponse = response.json();
    assert_eq!(context.passages, 1);
    assert!(context.context.starts_with("w0000 w0001"));
    assert_eq!(embedder.batch_calls(), 1);
    assert!(fixture.collection_dir("biology").exists());
}

#[tokio::test]
async fn test_search_returns_scored_results() {
    let (server, _fixture, _) = create_test_server().await;
    let (name, value) = api_key_header();

    let response = server
        .post("/rag/search")
        .add_header(name, value)
        .json(&json!({ "query": "b0001 b0002", "k": 2 }))
        .await;
    response.assert_status_ok();

    let search: SearchResponse = response.json();
    assert_eq!(search.results.len(), 2);
    assert!(search.results[0].source.ends_with("b.txt"));
    assert!(search.results[0].score >= search.results[1].score);
}

#[tokio::test]
async fn test_zero_k_is_bad_request() {
    let (server, _fixture, _) = create_test_server().await;
    let (name, value) = api_key_header();

    let response = server
        .post("/rag/search")
        .add_header(name, value)
        .json(&json!({ "query": "w0001", "k": 0 }))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_unknown_collection_is_not_built() {
    let (server, fixture, embedder) = create_test_server().await;
    let (name, value) = api_key_header();

    let response = server
        .post("/rag/context")
        .add_header(name, value)
        .json(&json!({ "query": "w0001", "collection": "chemistry" }))
        .await;
    response.assert_status_not_found();
    assert_eq!(embedder.batch_calls(), 0);
    assert!(!fixture.collection_dir("chemistry").exists());
}

#[tokio::test]
async fn test_rebuild_and_status() {
    let (server, fixture, embedder) = create_test_server().await;

    let (name, value) = api_key_header();
    let response = server.get("/rag/status/biology").add_header(name, value).await;
    response.assert_status_ok();
    let status: CollectionStatus = response.json();
    assert!(!status.attached);
    assert!(!status.persisted);

    let (name, value) = api_key_header();
    let response = server.post("/rag/rebuild").add_header(name, value).await;
    response.assert_status_ok();
    let report: BuildReport = response.json();
    assert_eq!(report.collection, "biology");
    assert_eq!(report.documents, 2);
    assert_eq!(report.chunks, 4);

    // a new document is picked up by an explicit rebuild
    fixture.write_doc("c.txt", "Photosynthesis converts light into chemical energy.");
    let (name, value) = api_key_header();
    let response = server
        .post("/rag/rebuild")
        .add_header(name, value)
        .json(&json!({ "collection": "biology" }))
        .await;
    response.assert_status_ok();
    let report: BuildReport = response.json();
    assert_eq!(report.documents, 3);
    assert_eq!(embedder.batch_calls(), 2);

    let (name, value) = api_key_header();
    let response = server.get("/rag/status/biology").add_header(name, value).await;
    let status: CollectionStatus = response.json();
    assert!(status.attached);
    assert!(status.persisted);
    assert_eq!(status.stats.map(|s| s.vector_count), Some(5));
}

#[tokio::test]
async fn test_status_rejects_invalid_collection_name() {
    let (server, _fixture, _) = create_test_server().await;
    let (name, value) = api_key_header();

    let response = server.get("/rag/status/.hidden").add_header(name, value).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let (server, _fixture, embedder) = create_test_server().await;
    let (name, value) = api_key_header();

    let query = "w".repeat(tutor::api::routes::MAX_BODY_BYTES + 1);
    let response = server
        .post("/rag/context")
        .add_header(name, value)
        .json(&json!({ "query": query }))
        .await;
    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(embedder.batch_calls(), 0);
}
