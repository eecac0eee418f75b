use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Failure taxonomy of the retrieval and generation pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// The persistent index could not be opened or created. Fatal, never retried.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),
    #[error("generation unavailable: {0}")]
    GenerationUnavailable(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A read or write against an already opened index failed.
    #[error("storage error: {0}")]
    Storage(String),
    #[error("corpus error: {0}")]
    Corpus(String),
    #[error("ingestion aborted at record {record_id} after {inserted} inserts: {source}")]
    IngestAborted {
        record_id: String,
        inserted: usize,
        #[source]
        source: Box<RagError>,
    },
}

impl RagError {
    pub fn storage<E: std::fmt::Display>(err: E) -> Self {
        RagError::Storage(err.to_string())
    }

    pub fn store_unavailable<E: std::fmt::Display>(err: E) -> Self {
        RagError::StoreUnavailable(err.to_string())
    }

    /// Stable, secret-free label for the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::StoreUnavailable(_) => "store_unavailable",
            RagError::EmbeddingUnavailable(_) => "embedding_unavailable",
            RagError::GenerationUnavailable(_) => "generation_unavailable",
            RagError::InvalidArgument(_) => "invalid_argument",
            RagError::Storage(_) => "storage",
            RagError::Corpus(_) => "corpus",
            RagError::IngestAborted { source, .. } => source.kind(),
        }
    }
}

/// Replaces every occurrence of `secret` in `message`.
pub fn scrub_secret(message: &str, secret: &str) -> String {
    if secret.is_empty() {
        return message.to_string();
    }
    message.replace(secret, "****")
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        match &err {
            RagError::InvalidArgument(_) | RagError::Corpus(_) => {
                ApiError::BadRequest(err.to_string())
            }
            RagError::Storage(_) => ApiError::Internal(err.to_string()),
            RagError::StoreUnavailable(_)
            | RagError::EmbeddingUnavailable(_)
            | RagError::GenerationUnavailable(_)
            | RagError::IngestAborted { .. } => ApiError::ServiceUnavailable(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
