pub mod gemini;
pub mod lmstudio;
pub mod provider;
pub mod types;

use std::sync::Arc;

pub use gemini::GeminiProvider;
pub use lmstudio::LmStudioProvider;
pub use provider::{ConversationHandle, EmbeddingProvider, GenerationProvider};
pub use types::{ChatMessage, ChatRole};

use crate::core::config::validation::requires_api_key;
use crate::core::config::{ProviderKind, ProviderSettings};
use crate::core::errors::RagError;

/// The embedding and generation backends the app runs against.
#[derive(Clone)]
pub struct Providers {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub generator: Arc<dyn GenerationProvider>,
}

pub fn build_providers(settings: &ProviderSettings) -> Result<Providers, RagError> {
    let api_key = settings.api_key.clone().filter(|k| !k.trim().is_empty());
    if requires_api_key(settings) && api_key.is_none() {
        return Err(RagError::InvalidArgument(
            "Gemini requires provider.api_key or GOOGLE_API_KEY".to_string(),
        ));
    }

    match settings.kind {
        ProviderKind::Gemini => {
            let gemini = Arc::new(GeminiProvider::new(settings, api_key.unwrap_or_default())?);
            Ok(Providers {
                embedder: gemini.clone(),
                generator: gemini,
            })
        }
        ProviderKind::OpenaiCompatible => {
            let provider = Arc::new(LmStudioProvider::new(settings)?);
            Ok(Providers {
                embedder: provider.clone(),
                generator: provider,
            })
        }
    }
}
