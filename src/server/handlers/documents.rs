use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::rag::sample_recipes;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SampleQuery {
    /// Add the missing part of the corpus even if the collection is non-empty.
    #[serde(default)]
    pub resume: bool,
}

pub async fn list_documents(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let documents = state.store.get_all().await?;
    Ok(Json(json!({
        "count": documents.len(),
        "documents": documents,
    })))
}

/// Loads the bundled sample recipes unless the collection already has
/// documents. `?resume=true` completes a partly ingested collection instead.
pub async fn ingest_sample(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SampleQuery>,
) -> Result<Json<Value>, ApiError> {
    let records = sample_recipes(&state.settings.store.id_prefix);
    let report = if params.resume {
        state.ingestion.resume(&state.store, &records).await?
    } else {
        state.ingestion.ingest_once(&state.store, &records).await?
    };
    Ok(Json(json!({ "report": report })))
}

pub async fn reset_documents(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let removed = state.ingestion.reset(&state.store).await?;
    Ok(Json(json!({ "removed": removed })))
}

/// Retrieval only; nothing is sent to the generation model.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<Value>, ApiError> {
    let top_k = payload.top_k.unwrap_or_else(|| state.orchestrator.top_k());
    let result = state.orchestrator.retriever().query(&payload.query, top_k).await?;
    Ok(Json(json!({ "results": result.entries() })))
}
