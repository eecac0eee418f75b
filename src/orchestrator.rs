//! One grounded request/response cycle: retrieve, compose, prompt, ask.

use serde::Serialize;

use crate::conversation::ConversationSession;
use crate::core::config::PromptSettings;
use crate::core::errors::RagError;
use crate::rag::{ContextComposer, ContextLimits, Retriever};

/// Result of a turn as seen by API callers.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub reply: String,
    /// Ids of the records spliced into the prompt, best match first.
    pub sources: Vec<String>,
    /// True when the reply is an error notice rather than a model answer.
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

#[derive(Clone)]
pub struct RagOrchestrator {
    retriever: Retriever,
    top_k: usize,
    limits: ContextLimits,
    template: PromptSettings,
}

impl RagOrchestrator {
    pub fn new(
        retriever: Retriever,
        top_k: usize,
        limits: ContextLimits,
        template: PromptSettings,
    ) -> Self {
        Self {
            retriever,
            top_k,
            limits,
            template,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Runs a turn and always produces displayable text.
    pub async fn handle_turn(&self, session: &mut ConversationSession, query: &str) -> String {
        self.respond(session, query).await.reply
    }

    /// Like `handle_turn`, but reports failures as a degraded outcome
    /// instead of folding them into plain text.
    pub async fn respond(&self, session: &mut ConversationSession, query: &str) -> TurnOutcome {
        match self.try_handle_turn(session, query).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(
                    session = session.id(),
                    kind = err.kind(),
                    "Turn failed: {}",
                    err
                );
                TurnOutcome {
                    reply: render_user_error(&err),
                    sources: Vec::new(),
                    degraded: true,
                    error_kind: Some(err.kind()),
                }
            }
        }
    }

    pub async fn try_handle_turn(
        &self,
        session: &mut ConversationSession,
        query: &str,
    ) -> Result<TurnOutcome, RagError> {
        let retrieved = match self.retriever.query(query, self.top_k).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!("Retrieval failed, continuing ungrounded: {}", err);
                Default::default()
            }
        };

        let records = self.limits.apply(retrieved.into_records());
        let sources = records.iter().map(|r| r.id.clone()).collect();
        let context = ContextComposer::compose(&records);
        let prompt = build_grounded_prompt(&self.template, &context, query);

        let reply = session.ask(&prompt).await?;
        Ok(TurnOutcome {
            reply,
            sources,
            degraded: false,
            error_kind: None,
        })
    }
}

pub fn build_grounded_prompt(template: &PromptSettings, context: &str, query: &str) -> String {
    format!(
        "{}\n\n=== CONTEXT ===\n{}\n\n=== USER ===\n{}\n\n{}",
        template.preamble.trim(),
        context,
        query,
        template.closing.trim()
    )
}

/// User-facing text for a failed turn. Names the failure kind only; provider
/// messages are never echoed since they may carry request details.
pub fn render_user_error(err: &RagError) -> String {
    let detail = match err {
        RagError::GenerationUnavailable(_) => {
            "The language model could not be reached. Please try again in a moment."
        }
        RagError::EmbeddingUnavailable(_) => {
            "The embedding service could not be reached. Please try again in a moment."
        }
        RagError::StoreUnavailable(_) | RagError::Storage(_) => {
            "The recipe index is unavailable right now."
        }
        RagError::InvalidArgument(_) => "The request was not valid.",
        RagError::Corpus(_) | RagError::IngestAborted { .. } => {
            "The recipe collection could not be loaded."
        }
    };
    format!("Sorry, something went wrong ({}). {}", err.kind(), detail)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::rag::{DocumentRecord, IngestFailurePolicy, RecordFields, NO_CONTEXT_SENTINEL};
    use crate::test_support::{recipe, temp_store, EchoGenerator, KeywordEmbedder};

    async fn orchestrator(
        records: &[DocumentRecord],
        top_k: usize,
    ) -> (tempfile::TempDir, RagOrchestrator) {
        let (dir, store) =
            temp_store(KeywordEmbedder::recipes(), IngestFailurePolicy::Progressive).await;
        store.add_batch(records).await.unwrap();
        let retriever = Retriever::new(Arc::new(store));
        let orchestrator = RagOrchestrator::new(
            retriever,
            top_k,
            ContextLimits::unbounded(),
            PromptSettings::default(),
        );
        (dir, orchestrator)
    }

    #[test]
    fn prompt_has_context_and_user_sections() {
        let prompt =
            build_grounded_prompt(&PromptSettings::default(), "Name: Soup", "what soup?");
        let context_at = prompt.find("=== CONTEXT ===\nName: Soup").unwrap();
        let user_at = prompt.find("=== USER ===\nwhat soup?").unwrap();
        assert!(context_at < user_at);
        assert!(prompt.starts_with("You are a chef assistant."));
        assert!(prompt.ends_with("general cooking knowledge."));
    }

    #[tokio::test]
    async fn grounds_the_prompt_with_the_best_record() {
        let records = vec![
            recipe("recipe_0", "Alpha Stew", "alpha alpha"),
            recipe("recipe_1", "Beta Bake", "beta beta"),
        ];
        let (_dir, orchestrator) = orchestrator(&records, 1).await;
        let generator = EchoGenerator::default();
        let mut session = ConversationSession::start(&generator).await.unwrap();

        let reply = orchestrator.handle_turn(&mut session, "something with alpha").await;
        assert!(reply.contains("Name: Alpha Stew"));
        assert!(!reply.contains("Beta Bake"));

        let reply = orchestrator.handle_turn(&mut session, "a beta dish").await;
        assert!(reply.contains("Name: Beta Bake"));
        assert!(!reply.contains("Alpha Stew"));
        assert_eq!(session.turn_count(), 4);
    }

    #[tokio::test]
    async fn empty_store_still_answers_with_sentinel_context() {
        let (_dir, orchestrator) = orchestrator(&[], 3).await;
        let generator = EchoGenerator::default();
        let mut session = ConversationSession::start(&generator).await.unwrap();

        let outcome = orchestrator
            .try_handle_turn(&mut session, "anything")
            .await
            .unwrap();
        assert!(outcome.reply.contains(NO_CONTEXT_SENTINEL));
        assert!(outcome.sources.is_empty());
        assert!(!outcome.degraded);
    }

    #[tokio::test]
    async fn generation_failure_is_rendered_without_secrets() {
        let records = vec![DocumentRecord::new(
            "recipe_0",
            "Toast",
            RecordFields {
                ingredients: "bread".to_string(),
                ..RecordFields::default()
            },
        )];
        let (_dir, orchestrator) = orchestrator(&records, 3).await;
        let generator = EchoGenerator::default();
        generator.set_failing(true);
        let mut session = ConversationSession::start(&generator).await.unwrap();

        let outcome = orchestrator.respond(&mut session, "toast?").await;
        assert!(outcome.degraded);
        assert_eq!(outcome.error_kind, Some("generation_unavailable"));
        assert!(outcome.reply.contains("generation_unavailable"));
        assert!(!outcome.reply.contains("AIza-test-secret"));
        assert_eq!(session.turn_count(), 1);
    }
}
