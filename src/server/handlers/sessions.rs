use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::conversation::ConversationSession;
use crate::core::errors::ApiError;
use crate::state::sessions::SharedSession;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

async fn find_session(state: &AppState, session_id: &str) -> Result<SharedSession, ApiError> {
    state
        .sessions
        .get(session_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Session '{}' not found", session_id)))
}

pub async fn create_session(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let session = ConversationSession::start(state.providers.generator.as_ref()).await?;
    let session_id = state.sessions.insert(session).await;
    tracing::info!("Created session {}", session_id);
    Ok(Json(json!({ "session_id": session_id })))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session = find_session(&state, &session_id).await?;
    let session = session.lock().await;
    Ok(Json(json!({
        "session_id": session.id(),
        "turn_count": session.turn_count(),
        "turns": session.turns(),
    })))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.sessions.remove(&session_id).await {
        return Err(ApiError::NotFound(format!("Session '{}' not found", session_id)));
    }
    Ok(Json(json!({ "success": true })))
}

/// Runs one grounded turn. Generation failures come back as a normal reply
/// with `degraded: true` so the session stays usable.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }

    let session = find_session(&state, &session_id).await?;
    let mut session = session.lock().await;
    let outcome = state.orchestrator.respond(&mut session, &payload.message).await;

    Ok(Json(json!({
        "reply": outcome.reply,
        "degraded": outcome.degraded,
        "sources": outcome.sources,
        "error_kind": outcome.error_kind,
    })))
}

pub async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session = find_session(&state, &session_id).await?;
    session.lock().await.reset();
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_state, EchoGenerator};

    async fn new_session(state: &Arc<AppState>) -> String {
        let Json(body) = create_session(State(state.clone())).await.unwrap();
        body["session_id"].as_str().unwrap().to_string()
    }

    fn message(text: &str) -> Json<ChatRequest> {
        Json(ChatRequest {
            message: text.to_string(),
        })
    }

    #[tokio::test]
    async fn chat_records_turns_and_reset_clears_them() {
        let (_dir, state) = test_state(EchoGenerator::default()).await;
        let id = new_session(&state).await;

        let Json(reply) = chat(State(state.clone()), Path(id.clone()), message("hello"))
            .await
            .unwrap();
        assert_eq!(reply["degraded"], false);
        assert!(reply["reply"].as_str().unwrap().contains("=== USER ===\nhello"));

        let Json(log) = get_session(State(state.clone()), Path(id.clone())).await.unwrap();
        assert_eq!(log["turn_count"], 2);
        assert_eq!(log["turns"][1]["role"], "assistant");

        reset_session(State(state.clone()), Path(id.clone())).await.unwrap();
        let Json(log) = get_session(State(state), Path(id)).await.unwrap();
        assert_eq!(log["turn_count"], 0);
    }

    #[tokio::test]
    async fn generation_failure_is_a_degraded_reply() {
        let generator = EchoGenerator::default();
        let (_dir, state) = test_state(generator.clone()).await;
        let id = new_session(&state).await;

        generator.set_failing(true);
        let Json(reply) = chat(State(state), Path(id), message("hello")).await.unwrap();
        assert_eq!(reply["degraded"], true);
        assert_eq!(reply["error_kind"], "generation_unavailable");
        assert!(!reply["reply"].as_str().unwrap().contains("AIza-test-secret"));
    }

    #[tokio::test]
    async fn unknown_session_and_empty_message_are_rejected() {
        let (_dir, state) = test_state(EchoGenerator::default()).await;

        let err = chat(State(state.clone()), Path("missing".to_string()), message("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let id = new_session(&state).await;
        let err = chat(State(state.clone()), Path(id.clone()), message("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        delete_session(State(state.clone()), Path(id.clone())).await.unwrap();
        let err = delete_session(State(state), Path(id)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
