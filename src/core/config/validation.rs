use super::settings::{AppConfig, ProviderKind, ProviderSettings};
use crate::core::errors::ApiError;

const MAX_TOP_K: usize = 100;

pub fn validate_config(config: &AppConfig) -> Result<(), ApiError> {
    if config.retrieval.top_k == 0 || config.retrieval.top_k > MAX_TOP_K {
        return Err(invalid(
            "retrieval.top_k",
            &format!("must be between 1 and {}", MAX_TOP_K),
        ));
    }
    if config.retrieval.max_records == Some(0) {
        return Err(invalid("retrieval.max_records", "must be at least 1 when set"));
    }
    if config.retrieval.max_chars == Some(0) {
        return Err(invalid("retrieval.max_chars", "must be at least 1 when set"));
    }

    if config.store.collection.trim().is_empty() {
        return Err(invalid("store.collection", "must not be empty"));
    }
    if config.store.id_prefix.trim().is_empty() {
        return Err(invalid("store.id_prefix", "must not be empty"));
    }

    if config.provider.embedding_model.trim().is_empty() {
        return Err(invalid("provider.embedding_model", "must not be empty"));
    }
    if config.provider.generation_model.trim().is_empty() {
        return Err(invalid("provider.generation_model", "must not be empty"));
    }
    if config.provider.request_timeout_secs == 0 {
        return Err(invalid("provider.request_timeout_secs", "must be at least 1"));
    }
    if let Some(url) = &config.provider.base_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid("provider.base_url", "must be an http(s) URL"));
        }
    }

    if config.server.host.trim().is_empty() {
        return Err(invalid("server.host", "must not be empty"));
    }

    Ok(())
}

/// The Gemini API refuses unauthenticated calls; other providers may run keyless.
pub fn requires_api_key(provider: &ProviderSettings) -> bool {
    provider.kind == ProviderKind::Gemini
}

fn invalid(field: &str, reason: &str) -> ApiError {
    ApiError::BadRequest(format!("Invalid config field '{}': {}", field, reason))
}
