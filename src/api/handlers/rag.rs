//! Retrieval API handlers.
//!
//! Every handler resolves the collection (request value or the configured
//! default), makes sure it is attached, then delegates to the retrieval service.

use crate::{
    rag::join_context,
    types::{
        AppError, BuildReport, CollectionStatus, ContextRequest, ContextResponse,
        RebuildRequest, Result, SearchRequest, SearchResponse,
    },
    AppState,
};
use axum::{
    extract::{Path, State},
    Json,
};
use std::time::Instant;

fn collection_or_default(state: &AppState, collection: Option<String>) -> String {
    collection.unwrap_or_else(|| state.retrieval.default_collection().to_string())
}

/// `POST /rag/context`
pub async fn context(
    State(state): State<AppState>,
    Json(payload): Json<ContextRequest>,
) -> Result<Json<ContextResponse>> {
    let start = Instant::now();
    let collection = collection_or_default(&state, payload.collection);
    let k = payload.k.unwrap_or(state.config.rag.default_k);

    state.retrieval.prepare(&collection).await?;
    let passages = state
        .retrieval
        .retrieve_with_scores(&collection, &payload.query, k)
        .await?;

    tracing::info!(
        collection = %collection,
        passages = passages.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Context retrieved"
    );

    Ok(Json(ContextResponse {
        context: join_context(&passages),
        passages: passages.len(),
    }))
}

/// `POST /rag/search`
pub async fn search(
    State(state): State<AppState>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let collection = collection_or_default(&state, payload.collection);
    let k = payload.k.unwrap_or(state.config.rag.default_k);

    state.retrieval.prepare(&collection).await?;
    let results = state
        .retrieval
        .retrieve_with_scores(&collection, &payload.query, k)
        .await?;

    Ok(Json(SearchResponse { results }))
}

/// `POST /rag/rebuild`
///
/// Rebuilds from the configured corpus. Only the configured collection or one
/// that is already persisted can be rebuilt.
pub async fn rebuild(
    State(state): State<AppState>,
    payload: Option<Json<RebuildRequest>>,
) -> Result<Json<BuildReport>> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let collection = collection_or_default(&state, request.collection);

    if collection != state.retrieval.default_collection() {
        let status = state.retrieval.status(&collection).await?;
        if !status.persisted {
            return Err(AppError::NotFound(format!(
                "Collection '{}' not found",
                collection
            )));
        }
    }

    let report = state
        .retrieval
        .rebuild(&collection, &state.config.rag.corpus_dir)
        .await?;
    Ok(Json(report))
}

/// `GET /rag/status/{collection}`
pub async fn status(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Result<Json<CollectionStatus>> {
    Ok(Json(state.retrieval.status(&collection).await?))
}
