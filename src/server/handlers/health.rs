use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn health(State(_state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let document_count = state.store.count().await?;
    let collection = state.store.collection();
    let embedder = &state.providers.embedder;
    let generator = &state.providers.generator;

    Ok(Json(json!({
        "status": "ok",
        "collection": collection.name,
        "metric": collection.metric.as_str(),
        "document_count": document_count,
        "session_count": state.sessions.len().await,
        "top_k": state.orchestrator.top_k(),
        "embedding": { "provider": embedder.name(), "model": embedder.model() },
        "generation": { "provider": generator.name(), "model": generator.model() },
    })))
}
