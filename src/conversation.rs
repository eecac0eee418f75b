//! Conversation sessions: an ordered turn log bound to a generation backend.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::errors::RagError;
use crate::llm::{ChatMessage, ChatRole, ConversationHandle, GenerationProvider};

pub type Role = ChatRole;

#[derive(Debug, Clone, Serialize)]
pub struct ConversationTurn {
    /// 1-based position in the log; restarts after `reset`.
    pub sequence: usize,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct TurnLog {
    turns: Vec<ConversationTurn>,
}

impl TurnLog {
    fn push(&mut self, role: Role, content: String) {
        let sequence = self.turns.len() + 1;
        self.turns.push(ConversationTurn {
            sequence,
            role,
            content,
            created_at: Utc::now(),
        });
    }

    /// Backend view of the log: completed user/assistant exchanges only.
    ///
    /// A user turn whose `send` failed stays in the log but is never replayed,
    /// so the backend never sees two user messages in a row.
    fn as_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.turns.len());
        let mut turns = self.turns.iter().peekable();
        while let Some(turn) = turns.next() {
            if turn.role != Role::User {
                continue;
            }
            if let Some(reply) = turns.next_if(|next| next.role == Role::Assistant) {
                messages.push(ChatMessage::user(turn.content.clone()));
                messages.push(ChatMessage::assistant(reply.content.clone()));
            }
        }
        messages
    }
}

pub struct ConversationSession {
    id: String,
    handle: Box<dyn ConversationHandle>,
    log: TurnLog,
}

impl ConversationSession {
    pub fn new(id: impl Into<String>, handle: Box<dyn ConversationHandle>) -> Self {
        Self {
            id: id.into(),
            handle,
            log: TurnLog::default(),
        }
    }

    /// Opens a fresh session with a random id.
    pub async fn start(provider: &dyn GenerationProvider) -> Result<Self, RagError> {
        let handle = provider.start_conversation().await?;
        Ok(Self::new(uuid::Uuid::new_v4().to_string(), handle))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sends `text` with the prior history and records both sides.
    ///
    /// On failure the user turn stays in the log and no assistant turn is
    /// added. The assistant turn is appended only after `send` resolves, so a
    /// dropped future never leaves a half-written exchange.
    pub async fn ask(&mut self, text: &str) -> Result<String, RagError> {
        let history = self.log.as_messages();
        self.log.push(Role::User, text.to_string());

        let reply = self.handle.send(&history, text).await?;
        self.log.push(Role::Assistant, reply.clone());
        Ok(reply)
    }

    pub fn reset(&mut self) {
        self.log = TurnLog::default();
        tracing::debug!("Session {} reset", self.id);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.log.turns
    }

    pub fn turn_count(&self) -> usize {
        self.log.turns.len()
    }
}
