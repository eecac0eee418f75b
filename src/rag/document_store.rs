//! DocumentStore: the collection-bound facade over a `PersistentIndex`.
//!
//! Owns the embedding binding, the ingest-once policy and the ingestion
//! pacer. Reads (`count`, `query`, `get_all`) take `&self` and are safe to run
//! concurrently; ingestion is expected to be serialized by the caller (see
//! `IngestionGate`).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};

use super::record::{DocumentRecord, RetrievalResult};
use super::store::{CollectionHandle, IndexEntry, PersistentIndex, SimilarityMetric};
use crate::core::errors::RagError;
use crate::llm::EmbeddingProvider;

/// What happens to a batch when an embedding call fails part-way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestFailurePolicy {
    /// Insert record by record; records before the failing one stay indexed.
    #[default]
    Progressive,
    /// Embed everything first, then insert in one transaction; any failure inserts nothing.
    Atomic,
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub metric: SimilarityMetric,
    /// Minimum spacing between ingestion embedding calls. Zero disables pacing.
    pub ingest_delay: Duration,
    pub failure_policy: IngestFailurePolicy,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            metric: SimilarityMetric::Cosine,
            ingest_delay: Duration::from_secs(2),
            failure_policy: IngestFailurePolicy::Progressive,
        }
    }
}

/// Outcome of one ingestion call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub inserted: usize,
    /// Records whose id was already indexed (or repeated within the batch).
    pub skipped_existing: usize,
    /// Ids that were already indexed with different content.
    pub conflicts: Vec<String>,
    /// The whole batch was skipped because the collection was not empty.
    pub skipped_non_empty: bool,
}

pub struct DocumentStore {
    index: Arc<dyn PersistentIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    collection: CollectionHandle,
    failure_policy: IngestFailurePolicy,
    pacer: Option<DefaultDirectRateLimiter>,
}

impl DocumentStore {
    /// Attaches to collection `name`, creating it if needed.
    ///
    /// Fails with `StoreUnavailable` when the index cannot create or read the
    /// collection; callers treat that as fatal.
    pub async fn ensure_collection(
        index: Arc<dyn PersistentIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        name: &str,
        options: StoreOptions,
    ) -> Result<Self, RagError> {
        let collection = index
            .create_or_open(name, options.metric)
            .await
            .map_err(|e| match e {
                RagError::StoreUnavailable(_) => e,
                other => RagError::StoreUnavailable(other.to_string()),
            })?;

        tracing::info!(
            "Attached to collection '{}' (metric: {}, embedder: {}/{})",
            collection.name,
            collection.metric.as_str(),
            embedder.name(),
            embedder.model()
        );

        let pacer = Quota::with_period(options.ingest_delay).map(RateLimiter::direct);

        Ok(Self {
            index,
            embedder,
            collection,
            failure_policy: options.failure_policy,
            pacer,
        })
    }

    pub fn collection(&self) -> &CollectionHandle {
        &self.collection
    }

    pub async fn count(&self) -> Result<usize, RagError> {
        self.index.count(&self.collection).await
    }

    /// Ingest-once bulk insert: skipped entirely when the collection already
    /// holds documents.
    pub async fn add_batch(&self, records: &[DocumentRecord]) -> Result<IngestReport, RagError> {
        if records.is_empty() {
            return Ok(IngestReport::default());
        }

        let existing = self.count().await?;
        if existing > 0 {
            tracing::info!(
                "Collection '{}' already holds {} documents; skipping ingestion of {} records",
                self.collection.name,
                existing,
                records.len()
            );
            return Ok(IngestReport {
                skipped_non_empty: true,
                ..IngestReport::default()
            });
        }

        self.ingest(records).await
    }

    /// Bypasses the ingest-once precondition. Ids already indexed are skipped
    /// without an embedding call.
    pub async fn add_batch_incremental(
        &self,
        records: &[DocumentRecord],
    ) -> Result<IngestReport, RagError> {
        self.ingest(records).await
    }

    /// Similarity search. An empty collection yields an empty result without
    /// calling the embedder.
    pub async fn query(&self, text: &str, top_k: usize) -> Result<RetrievalResult, RagError> {
        if top_k == 0 {
            return Err(RagError::InvalidArgument("top_k must be at least 1".to_string()));
        }
        if self.count().await? == 0 {
            return Ok(RetrievalResult::empty());
        }

        let vector = self.embed(text).await?;
        let hits = self.index.query(&self.collection, &vector, top_k).await?;

        let scored = hits
            .into_iter()
            .map(|hit| {
                serde_json::from_value::<DocumentRecord>(hit.metadata)
                    .map(|record| (record, hit.score))
                    .map_err(|e| RagError::Storage(format!("document {}: {}", hit.id, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RetrievalResult::from_scored(scored))
    }

    /// Every record in insertion order.
    pub async fn get_all(&self) -> Result<Vec<DocumentRecord>, RagError> {
        self.index
            .get_all(&self.collection)
            .await?
            .into_iter()
            .map(|metadata| serde_json::from_value(metadata).map_err(RagError::storage))
            .collect()
    }

    /// Deletes every document in the collection.
    pub async fn reset(&self) -> Result<usize, RagError> {
        let removed = self.index.clear(&self.collection).await?;
        tracing::info!(
            "Reset collection '{}' ({} documents removed)",
            self.collection.name,
            removed
        );
        Ok(removed)
    }

    async fn ingest(&self, records: &[DocumentRecord]) -> Result<IngestReport, RagError> {
        let mut report = IngestReport::default();
        let mut seen = HashSet::new();
        let mut pending = Vec::with_capacity(records.len());

        for record in records {
            if !seen.insert(record.id.as_str()) {
                tracing::warn!("Duplicate id '{}' within batch; keeping the first", record.id);
                report.skipped_existing += 1;
                continue;
            }

            match self.index.fingerprint(&self.collection, &record.id).await? {
                Some(stored) => {
                    report.skipped_existing += 1;
                    if stored != record.fingerprint() {
                        tracing::warn!(
                            "Id '{}' is already indexed with different content; not overwritten",
                            record.id
                        );
                        report.conflicts.push(record.id.clone());
                    }
                }
                None => pending.push(record),
            }
        }

        match self.failure_policy {
            IngestFailurePolicy::Progressive => self.ingest_progressive(&pending, report).await,
            IngestFailurePolicy::Atomic => self.ingest_atomic(&pending, report).await,
        }
    }

    async fn ingest_progressive(
        &self,
        pending: &[&DocumentRecord],
        mut report: IngestReport,
    ) -> Result<IngestReport, RagError> {
        let total = pending.len();
        for (position, record) in pending.iter().enumerate() {
            let entry = match self.index_entry(record).await {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::error!(
                        "Embedding failed for '{}' ({}/{}); aborting batch with {} inserted",
                        record.id,
                        position + 1,
                        total,
                        report.inserted
                    );
                    return Err(RagError::IngestAborted {
                        record_id: record.id.clone(),
                        inserted: report.inserted,
                        source: Box::new(err),
                    });
                }
            };

            if self.index.insert(&self.collection, entry).await? {
                report.inserted += 1;
            } else {
                report.skipped_existing += 1;
            }
            tracing::info!("Added {} ({}/{})", record.title, position + 1, total);
        }

        Ok(report)
    }

    async fn ingest_atomic(
        &self,
        pending: &[&DocumentRecord],
        mut report: IngestReport,
    ) -> Result<IngestReport, RagError> {
        let mut entries = Vec::with_capacity(pending.len());
        for record in pending {
            match self.index_entry(record).await {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    tracing::error!(
                        "Embedding failed for '{}'; nothing from this batch was inserted",
                        record.id
                    );
                    return Err(RagError::IngestAborted {
                        record_id: record.id.clone(),
                        inserted: 0,
                        source: Box::new(err),
                    });
                }
            }
        }

        let attempted = entries.len();
        let written = self.index.insert_batch(&self.collection, entries).await?;
        report.inserted += written;
        report.skipped_existing += attempted - written;
        tracing::info!("Added {} records in one transaction", written);
        Ok(report)
    }

    async fn index_entry(&self, record: &DocumentRecord) -> Result<IndexEntry, RagError> {
        if let Some(pacer) = &self.pacer {
            pacer.until_ready().await;
        }

        let text = record.searchable_text();
        let embedding = self.embed(&text).await?;
        let metadata = serde_json::to_value(record).map_err(RagError::storage)?;

        Ok(IndexEntry {
            id: record.id.clone(),
            fingerprint: record.fingerprint(),
            text,
            metadata,
            embedding,
        })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let vector = self.embedder.embed(text).await.map_err(|e| match e {
            RagError::EmbeddingUnavailable(_) => e,
            other => RagError::EmbeddingUnavailable(other.to_string()),
        })?;
        if vector.is_empty() {
            return Err(RagError::EmbeddingUnavailable(
                "provider returned an empty vector".to_string(),
            ));
        }
        Ok(vector)
    }
}
