use std::sync::Arc;

use tokio::sync::Mutex;

use super::document_store::{DocumentStore, IngestReport};
use super::record::DocumentRecord;
use crate::core::errors::RagError;

/// Serializes ingestion so two callers can never both see an empty
/// collection and ingest the same corpus twice.
#[derive(Clone, Default)]
pub struct IngestionGate {
    lock: Arc<Mutex<()>>,
}

impl IngestionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingests `records` unless the collection already holds documents.
    pub async fn ingest_once(
        &self,
        store: &DocumentStore,
        records: &[DocumentRecord],
    ) -> Result<IngestReport, RagError> {
        let _guard = self.lock.lock().await;
        let report = store.add_batch(records).await?;
        if report.skipped_non_empty {
            tracing::info!(
                "Collection '{}' already populated, ingestion skipped",
                store.collection().name
            );
        } else {
            tracing::info!(
                "Ingested {} documents into '{}' ({} already present)",
                report.inserted,
                store.collection().name,
                report.skipped_existing
            );
        }
        Ok(report)
    }

    /// Adds whatever part of `records` is not indexed yet, even when the
    /// collection is non-empty. Recovers a corpus whose ingestion aborted
    /// part-way; ids already present are skipped without embedding.
    pub async fn resume(
        &self,
        store: &DocumentStore,
        records: &[DocumentRecord],
    ) -> Result<IngestReport, RagError> {
        let _guard = self.lock.lock().await;
        let report = store.add_batch_incremental(records).await?;
        tracing::info!(
            "Resumed ingestion into '{}': {} added, {} already present",
            store.collection().name,
            report.inserted,
            report.skipped_existing
        );
        Ok(report)
    }

    /// Empties the collection. Held under the gate so it never interleaves
    /// with a running ingestion.
    pub async fn reset(&self, store: &DocumentStore) -> Result<usize, RagError> {
        let _guard = self.lock.lock().await;
        store.reset().await
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use super::*;
    use crate::rag::{sample_recipes, IngestFailurePolicy, SqliteIndex, StoreOptions};
    use crate::test_support::{temp_store, KeywordEmbedder};

    async fn store_at(path: &Path, embedder: KeywordEmbedder) -> DocumentStore {
        let index = SqliteIndex::open(path).await.unwrap();
        DocumentStore::ensure_collection(
            Arc::new(index),
            Arc::new(embedder),
            "test_recipes",
            StoreOptions {
                ingest_delay: Duration::ZERO,
                ..StoreOptions::default()
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn concurrent_callers_ingest_exactly_once() {
        let embedder = KeywordEmbedder::recipes();
        let (_dir, store) = temp_store(embedder.clone(), IngestFailurePolicy::Progressive).await;
        let store = Arc::new(store);
        let gate = IngestionGate::new();
        let records = sample_recipes("recipe");

        let (a, b) = tokio::join!(
            gate.ingest_once(&store, &records),
            gate.ingest_once(&store, &records)
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.inserted + b.inserted, records.len());
        assert!(a.skipped_non_empty || b.skipped_non_empty);
        assert_eq!(store.count().await.unwrap(), records.len());
        assert_eq!(embedder.calls(), records.len());
    }

    #[tokio::test]
    async fn aborted_ingestion_is_completed_by_resume() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        let records = sample_recipes("recipe");
        let gate = IngestionGate::new();

        let flaky = store_at(&path, KeywordEmbedder::recipes().failing_on("spaghetti")).await;
        let err = gate.ingest_once(&flaky, &records).await.unwrap_err();
        assert!(matches!(err, RagError::IngestAborted { inserted: 1, .. }));
        drop(flaky);

        let healthy = KeywordEmbedder::recipes();
        let store = store_at(&path, healthy.clone()).await;
        let skipped = gate.ingest_once(&store, &records).await.unwrap();
        assert!(skipped.skipped_non_empty);
        assert_eq!(store.count().await.unwrap(), 1);

        let resumed = gate.resume(&store, &records).await.unwrap();
        assert_eq!(resumed.inserted, 4);
        assert_eq!(resumed.skipped_existing, 1);
        assert_eq!(healthy.calls(), 4);
        assert_eq!(store.count().await.unwrap(), 5);

        let ids: Vec<_> = store.get_all().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, ["recipe_0", "recipe_1", "recipe_2", "recipe_3", "recipe_4"]);
    }

    #[tokio::test]
    async fn reset_empties_the_collection() {
        let (_dir, store) =
            temp_store(KeywordEmbedder::recipes(), IngestFailurePolicy::Progressive).await;
        let gate = IngestionGate::new();
        gate.ingest_once(&store, &sample_recipes("recipe")).await.unwrap();

        assert_eq!(gate.reset(&store).await.unwrap(), 5);
        assert_eq!(store.count().await.unwrap(), 0);

        let report = gate.ingest_once(&store, &sample_recipes("recipe")).await.unwrap();
        assert_eq!(report.inserted, 5);
    }
}
