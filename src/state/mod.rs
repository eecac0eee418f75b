use std::sync::Arc;
use std::time::Duration;

use crate::core::config::{AppConfig, AppPaths, ConfigService};
use crate::core::errors::RagError;
use crate::llm::{build_providers, Providers};
use crate::orchestrator::RagOrchestrator;
use crate::rag::{
    load_corpus_file, sample_recipes, ContextLimits, DocumentRecord, DocumentStore,
    IngestionGate, Retriever, SqliteIndex, StoreOptions,
};

pub mod error;
pub mod sessions;

use error::InitializationError;
use sessions::SessionRegistry;

/// Application state shared across all routes.
///
/// The document store is opened once and shared; every session and the
/// ingestion endpoints go through the same `Arc<DocumentStore>`.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: AppConfig,
    pub providers: Providers,
    pub store: Arc<DocumentStore>,
    pub orchestrator: RagOrchestrator,
    pub sessions: SessionRegistry,
    pub ingestion: IngestionGate,
}

impl AppState {
    /// Loads configuration, builds providers and opens the store.
    ///
    /// A store that cannot be opened is fatal. Startup ingestion failures are
    /// logged and the server still starts with whatever the index holds.
    pub async fn initialize_with_paths(
        paths: Arc<AppPaths>,
    ) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        tracing::debug!(
            "Loaded configuration from {}: {}",
            config.config_path().display(),
            config.redact_sensitive_values(&config.load_config())
        );
        let settings = config
            .load_app_config()
            .map_err(|e| InitializationError::Config(e.into()))?;
        let providers = build_providers(&settings.provider)
            .map_err(|e| InitializationError::Providers(e.into()))?;

        let state = Self::assemble(paths, config, settings, providers).await?;

        if state.settings.store.ingest_on_start {
            if let Err(err) = state.ingest_startup_corpus().await {
                tracing::error!(kind = err.kind(), "Startup ingestion failed: {}", err);
            }
        }

        Ok(state)
    }

    /// Wires the state from already-built parts.
    pub async fn assemble(
        paths: Arc<AppPaths>,
        config: ConfigService,
        settings: AppConfig,
        providers: Providers,
    ) -> Result<Arc<Self>, InitializationError> {
        let index_path = match &settings.store.index_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => paths.user_data_dir.join(path),
            None => paths.index_path.clone(),
        };
        let index = SqliteIndex::open(&index_path)
            .await
            .map_err(|e| InitializationError::Store(e.into()))?;

        let store = DocumentStore::ensure_collection(
            Arc::new(index),
            providers.embedder.clone(),
            &settings.store.collection,
            StoreOptions {
                metric: settings.store.metric,
                ingest_delay: Duration::from_millis(settings.store.ingest_delay_ms),
                failure_policy: settings.store.failure_policy,
            },
        )
        .await
        .map_err(|e| InitializationError::Store(e.into()))?;
        let store = Arc::new(store);

        let idle_ttl = match settings.server.session_idle_ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let orchestrator = RagOrchestrator::new(
            Retriever::new(store.clone()),
            settings.retrieval.top_k,
            ContextLimits {
                max_records: settings.retrieval.max_records,
                max_chars: settings.retrieval.max_chars,
            },
            settings.prompt.clone(),
        );

        Ok(Arc::new(AppState {
            paths,
            config,
            settings,
            providers,
            store,
            orchestrator,
            sessions: SessionRegistry::with_idle_ttl(idle_ttl),
            ingestion: IngestionGate::new(),
        }))
    }

    /// The configured corpus file, or the bundled sample recipes.
    pub fn startup_corpus(&self) -> Result<Vec<DocumentRecord>, RagError> {
        let prefix = &self.settings.store.id_prefix;
        match &self.settings.store.corpus_path {
            Some(path) if path.is_absolute() => load_corpus_file(path, prefix),
            Some(path) => load_corpus_file(&self.paths.project_root.join(path), prefix),
            None => Ok(sample_recipes(prefix)),
        }
    }

    async fn ingest_startup_corpus(&self) -> Result<(), RagError> {
        let records = self.startup_corpus()?;
        if self.settings.store.resume_partial_ingest {
            self.ingestion.resume(&self.store, &records).await?;
        } else {
            self.ingestion.ingest_once(&self.store, &records).await?;
        }
        Ok(())
    }
}
