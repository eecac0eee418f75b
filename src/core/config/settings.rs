//! Typed view of `config.yml` merged with `secrets.yaml`.
//!
//! Every section carries serde defaults, so a missing file or a partial file
//! yields a usable configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::rag::{IngestFailurePolicy, SimilarityMetric};

pub const DEFAULT_COLLECTION: &str = "recipes_production_v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "models/text-embedding-004";
pub const DEFAULT_GENERATION_MODEL: &str = "models/gemini-flash-latest";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_OPENAI_BASE_URL: &str = "http://localhost:1234";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub store: StoreSettings,
    pub retrieval: RetrievalSettings,
    pub prompt: PromptSettings,
    pub provider: ProviderSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    /// Sessions idle longer than this are dropped. `0` keeps them until deleted.
    pub session_idle_ttl_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
            session_idle_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub collection: String,
    pub metric: SimilarityMetric,
    /// Overrides the index file location under the data directory.
    pub index_path: Option<PathBuf>,
    /// Minimum spacing between embedding calls during ingestion. `0` disables pacing.
    pub ingest_delay_ms: u64,
    pub failure_policy: IngestFailurePolicy,
    /// Prefix for ids assigned to corpus entries that carry none.
    pub id_prefix: String,
    /// Corpus file ingested at startup instead of the bundled sample recipes.
    pub corpus_path: Option<PathBuf>,
    pub ingest_on_start: bool,
    /// At startup, complete a corpus that an earlier run left partly ingested
    /// instead of skipping it because the collection is non-empty.
    pub resume_partial_ingest: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            metric: SimilarityMetric::Cosine,
            index_path: None,
            ingest_delay_ms: 2000,
            failure_policy: IngestFailurePolicy::Progressive,
            id_prefix: "recipe".to_string(),
            corpus_path: None,
            ingest_on_start: false,
            resume_partial_ingest: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub max_records: Option<usize>,
    pub max_chars: Option<usize>,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 3,
            max_records: None,
            max_chars: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    pub preamble: String,
    pub closing: String,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            preamble: "You are a chef assistant. Use these recipes to answer the user request."
                .to_string(),
            closing: "Use recipe content if relevant. If it is not, answer helpfully from general cooking knowledge."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Gemini,
    /// Any server speaking the OpenAI `/v1/chat/completions` and `/v1/embeddings` routes.
    OpenaiCompatible,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub embedding_model: String,
    pub generation_model: String,
    pub request_timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Gemini,
            base_url: None,
            api_key: None,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl ProviderSettings {
    pub fn resolved_base_url(&self) -> String {
        let base = match (&self.base_url, self.kind) {
            (Some(url), _) => url.as_str(),
            (None, ProviderKind::Gemini) => DEFAULT_GEMINI_BASE_URL,
            (None, ProviderKind::OpenaiCompatible) => DEFAULT_OPENAI_BASE_URL,
        };
        base.trim_end_matches('/').to_string()
    }
}
