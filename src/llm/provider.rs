use async_trait::async_trait;

use super::types::ChatMessage;
use crate::core::errors::RagError;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// provider name (e.g. "gemini", "openai_compatible")
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// embed one text; fails with `EmbeddingUnavailable`
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// open a conversation channel to the backend
    async fn start_conversation(&self) -> Result<Box<dyn ConversationHandle>, RagError>;
}

/// Stateless transport for one conversation.
///
/// The caller owns the transcript and passes prior turns on every call, so a
/// failed `send` leaves nothing behind on either side.
#[async_trait]
pub trait ConversationHandle: Send + Sync {
    /// send `prompt` after `history`; fails with `GenerationUnavailable`
    async fn send(&self, history: &[ChatMessage], prompt: &str) -> Result<String, RagError>;
}
