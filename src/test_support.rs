//! Stub providers and fixtures shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::config::{AppConfig, AppPaths, ConfigService};
use crate::core::errors::RagError;
use crate::llm::{
    ChatMessage, ConversationHandle, EmbeddingProvider, GenerationProvider, Providers,
};
use crate::rag::{
    DocumentRecord, DocumentStore, IngestFailurePolicy, RecordFields, SimilarityMetric,
    SqliteIndex, StoreOptions,
};
use crate::state::AppState;

const RECIPE_VOCABULARY: [&str; 12] = [
    "chocolate", "flour", "butter", "tomato", "cucumber", "feta", "banana", "egg", "pasta",
    "chicken", "alpha", "beta",
];

/// Bag-of-words embedder over a fixed vocabulary. Deterministic and offline.
#[derive(Clone)]
pub struct KeywordEmbedder {
    vocabulary: Vec<String>,
    fail_on: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl KeywordEmbedder {
    pub fn recipes() -> Self {
        Self {
            vocabulary: RECIPE_VOCABULARY.iter().map(|w| w.to_string()).collect(),
            fail_on: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fails every call whose text contains `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_lowercase());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword"
    }

    fn model(&self) -> &str {
        "bag-of-words"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = text.to_lowercase();
        if let Some(needle) = &self.fail_on {
            if lower.contains(needle.as_str()) {
                return Err(RagError::EmbeddingUnavailable("quota exhausted".to_string()));
            }
        }
        Ok(self
            .vocabulary
            .iter()
            .map(|word| lower.matches(word.as_str()).count() as f32)
            .collect())
    }
}

/// Generation stub that replies with the prompt it received, or fails on demand.
#[derive(Clone, Default)]
pub struct EchoGenerator {
    failing: Arc<AtomicBool>,
}

impl EchoGenerator {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl GenerationProvider for EchoGenerator {
    fn name(&self) -> &str {
        "echo"
    }

    fn model(&self) -> &str {
        "echo"
    }

    async fn start_conversation(&self) -> Result<Box<dyn ConversationHandle>, RagError> {
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl ConversationHandle for EchoGenerator {
    async fn send(&self, _history: &[ChatMessage], prompt: &str) -> Result<String, RagError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RagError::GenerationUnavailable(
                "HTTP 429 for key AIza-test-secret".to_string(),
            ));
        }
        Ok(prompt.to_string())
    }
}

pub fn recipe(id: &str, title: &str, ingredients: &str) -> DocumentRecord {
    DocumentRecord::new(
        id,
        title,
        RecordFields {
            category: Some("Test".to_string()),
            ingredients: ingredients.to_string(),
            instructions: format!("Combine {}.", ingredients),
            ..RecordFields::default()
        },
    )
}

/// Unpaced store over a fresh SQLite file. Keep the `TempDir` alive for the test.
pub async fn temp_store(
    embedder: KeywordEmbedder,
    failure_policy: IngestFailurePolicy,
) -> (tempfile::TempDir, DocumentStore) {
    let dir = tempfile::tempdir().unwrap();
    let index = SqliteIndex::open(dir.path().join("index.db")).await.unwrap();
    let store = DocumentStore::ensure_collection(
        Arc::new(index),
        Arc::new(embedder),
        "test_recipes",
        StoreOptions {
            metric: SimilarityMetric::Cosine,
            ingest_delay: Duration::ZERO,
            failure_policy,
        },
    )
    .await
    .unwrap();
    (dir, store)
}

/// App state over a temp data dir with stub providers and pacing disabled.
pub async fn test_state(generator: EchoGenerator) -> (tempfile::TempDir, Arc<AppState>) {
    let dir = tempfile::tempdir().unwrap();
    let paths = Arc::new(AppPaths::with_data_dir(
        dir.path().to_path_buf(),
        dir.path().join("data"),
    ));
    let mut settings = AppConfig::default();
    settings.store.ingest_delay_ms = 0;

    let providers = Providers {
        embedder: Arc::new(KeywordEmbedder::recipes()),
        generator: Arc::new(generator),
    };
    let state = AppState::assemble(paths.clone(), ConfigService::new(paths), settings, providers)
        .await
        .unwrap();
    (dir, state)
}
