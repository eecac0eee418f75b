//! SQLite-backed persistent index.
//!
//! In-process vector store using SQLite for metadata and
//! brute-force similarity scoring for search.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{CollectionHandle, IndexEntry, IndexHit, PersistentIndex, SimilarityMetric};
use crate::core::errors::RagError;

const INSERT_DOCUMENT: &str = "INSERT INTO rag_documents
        (collection, doc_id, content, fingerprint, metadata, embedding)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
     ON CONFLICT(collection, doc_id) DO NOTHING";

pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    /// Opens (or creates) the index file. Any failure here is `StoreUnavailable`.
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self, RagError> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                RagError::StoreUnavailable(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| {
                RagError::StoreUnavailable(format!("cannot open {}: {}", db_path.display(), e))
            })?;

        let index = Self { pool };
        index
            .init_schema()
            .await
            .map_err(|e| RagError::StoreUnavailable(e.to_string()))?;
        tracing::debug!("Opened vector index at {}", db_path.display());
        Ok(index)
    }

    async fn init_schema(&self) -> Result<(), RagError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rag_collections (
                name TEXT PRIMARY KEY,
                metric TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::storage)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rag_documents (
                collection TEXT NOT NULL REFERENCES rag_collections(name) ON DELETE CASCADE,
                doc_id TEXT NOT NULL,
                content TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (collection, doc_id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::storage)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn parse_metadata(raw: &str) -> Result<Value, RagError> {
        serde_json::from_str::<Value>(raw).map_err(RagError::storage)
    }

    fn encode_metadata(entry: &IndexEntry) -> Result<String, RagError> {
        serde_json::to_string(&entry.metadata).map_err(RagError::storage)
    }
}

#[async_trait]
impl PersistentIndex for SqliteIndex {
    async fn create_or_open(
        &self,
        name: &str,
        metric: SimilarityMetric,
    ) -> Result<CollectionHandle, RagError> {
        sqlx::query(
            "INSERT INTO rag_collections (name, metric) VALUES (?1, ?2)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(name)
        .bind(metric.as_str())
        .execute(&self.pool)
        .await
        .map_err(RagError::store_unavailable)?;

        let stored: String =
            sqlx::query_scalar("SELECT metric FROM rag_collections WHERE name = ?1")
                .bind(name)
                .fetch_one(&self.pool)
                .await
                .map_err(RagError::store_unavailable)?;

        let stored_metric = SimilarityMetric::parse(&stored).ok_or_else(|| {
            RagError::StoreUnavailable(format!(
                "collection '{}' uses unknown metric '{}'",
                name, stored
            ))
        })?;

        if stored_metric != metric {
            tracing::warn!(
                "Collection '{}' was created with metric {}; ignoring requested {}",
                name,
                stored_metric.as_str(),
                metric.as_str()
            );
        }

        Ok(CollectionHandle {
            name: name.to_string(),
            metric: stored_metric,
        })
    }

    async fn insert(
        &self,
        collection: &CollectionHandle,
        entry: IndexEntry,
    ) -> Result<bool, RagError> {
        let metadata = Self::encode_metadata(&entry)?;
        let blob = Self::serialize_embedding(&entry.embedding);

        let result = sqlx::query(INSERT_DOCUMENT)
            .bind(&collection.name)
            .bind(&entry.id)
            .bind(&entry.text)
            .bind(&entry.fingerprint)
            .bind(&metadata)
            .bind(&blob)
            .execute(&self.pool)
            .await
            .map_err(RagError::storage)?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_batch(
        &self,
        collection: &CollectionHandle,
        entries: Vec<IndexEntry>,
    ) -> Result<usize, RagError> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(RagError::storage)?;
        let mut written = 0usize;

        for entry in &entries {
            let metadata = Self::encode_metadata(entry)?;
            let blob = Self::serialize_embedding(&entry.embedding);

            let result = sqlx::query(INSERT_DOCUMENT)
                .bind(&collection.name)
                .bind(&entry.id)
                .bind(&entry.text)
                .bind(&entry.fingerprint)
                .bind(&metadata)
                .bind(&blob)
                .execute(&mut *tx)
                .await
                .map_err(RagError::storage)?;
            written += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(RagError::storage)?;
        Ok(written)
    }

    async fn fingerprint(
        &self,
        collection: &CollectionHandle,
        id: &str,
    ) -> Result<Option<String>, RagError> {
        sqlx::query_scalar(
            "SELECT fingerprint FROM rag_documents WHERE collection = ?1 AND doc_id = ?2",
        )
        .bind(&collection.name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RagError::storage)
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<IndexHit>, RagError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT doc_id, metadata, embedding FROM rag_documents WHERE collection = ?1",
        )
        .bind(&collection.name)
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::storage)?;

        let mut scored = Vec::with_capacity(rows.len());
        let mut mismatched = Vec::new();
        for row in &rows {
            let doc_id: String = row.try_get("doc_id").map_err(RagError::storage)?;
            let embedding_bytes: Vec<u8> = row.try_get("embedding").map_err(RagError::storage)?;
            let stored = Self::deserialize_embedding(&embedding_bytes);

            let Some(score) = collection.metric.score(vector, &stored) else {
                mismatched.push((doc_id, stored.len()));
                continue;
            };

            let raw_metadata: String = row.try_get("metadata").map_err(RagError::storage)?;
            scored.push(IndexHit {
                id: doc_id,
                metadata: Self::parse_metadata(&raw_metadata)?,
                score,
            });
        }

        if let Some((first_id, stored_dim)) = mismatched.first() {
            tracing::warn!(
                "Skipped {} of {} documents in '{}': stored dimension {} (e.g. '{}') \
                 does not match query dimension {}; reset the collection after changing \
                 the embedding model",
                mismatched.len(),
                rows.len(),
                collection.name,
                stored_dim,
                first_id,
                vector.len()
            );
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(top_k);

        Ok(scored)
    }

    async fn get_all(&self, collection: &CollectionHandle) -> Result<Vec<Value>, RagError> {
        let rows = sqlx::query(
            "SELECT metadata FROM rag_documents WHERE collection = ?1 ORDER BY rowid ASC",
        )
        .bind(&collection.name)
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::storage)?;

        rows.iter()
            .map(|row| {
                let raw: String = row.try_get("metadata").map_err(RagError::storage)?;
                Self::parse_metadata(&raw)
            })
            .collect()
    }

    async fn count(&self, collection: &CollectionHandle) -> Result<usize, RagError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM rag_documents WHERE collection = ?1")
                .bind(&collection.name)
                .fetch_one(&self.pool)
                .await
                .map_err(RagError::storage)?;

        Ok(count as usize)
    }

    async fn clear(&self, collection: &CollectionHandle) -> Result<usize, RagError> {
        let result = sqlx::query("DELETE FROM rag_documents WHERE collection = ?1")
            .bind(&collection.name)
            .execute(&self.pool)
            .await
            .map_err(RagError::storage)?;

        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_index(dir: &tempfile::TempDir) -> SqliteIndex {
        SqliteIndex::open(dir.path().join("index.db")).await.unwrap()
    }

    fn entry(id: &str, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            text: format!("Title: {}", id),
            fingerprint: format!("fp-{}", id),
            metadata: json!({ "id": id, "title": id }),
            embedding,
        }
    }

    #[tokio::test]
    async fn insert_and_query_orders_by_similarity() {
        let dir = tempfile::tempdir().unwrap();
        let index = test_index(&dir).await;
        let collection = index
            .create_or_open("recipes", SimilarityMetric::Cosine)
            .await
            .unwrap();

        index.insert(&collection, entry("far", vec![0.0, 1.0])).await.unwrap();
        index.insert(&collection, entry("near", vec![1.0, 0.1])).await.unwrap();
        index.insert(&collection, entry("mid", vec![1.0, 1.0])).await.unwrap();

        let hits = index.query(&collection, &[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(hits[0].score > hits[1].score);
        assert_eq!(hits[0].metadata["title"], "near");
    }

    #[tokio::test]
    async fn equal_scores_fall_back_to_id_order() {
        let dir = tempfile::tempdir().unwrap();
        let index = test_index(&dir).await;
        let collection = index
            .create_or_open("recipes", SimilarityMetric::Cosine)
            .await
            .unwrap();

        for id in ["c", "a", "b"] {
            index.insert(&collection, entry(id, vec![1.0, 0.0])).await.unwrap();
        }

        let hits = index.query(&collection, &[1.0, 0.0], 3).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn duplicate_ids_are_not_written_twice() {
        let dir = tempfile::tempdir().unwrap();
        let index = test_index(&dir).await;
        let collection = index
            .create_or_open("recipes", SimilarityMetric::Cosine)
            .await
            .unwrap();

        assert!(index.insert(&collection, entry("a", vec![1.0])).await.unwrap());
        assert!(!index.insert(&collection, entry("a", vec![0.5])).await.unwrap());
        assert_eq!(index.count(&collection).await.unwrap(), 1);

        let written = index
            .insert_batch(&collection, vec![entry("a", vec![1.0]), entry("b", vec![1.0])])
            .await
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(index.count(&collection).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn collections_are_isolated_and_keep_their_metric() {
        let dir = tempfile::tempdir().unwrap();
        let index = test_index(&dir).await;
        let first = index
            .create_or_open("first", SimilarityMetric::Euclidean)
            .await
            .unwrap();
        let reopened = index
            .create_or_open("first", SimilarityMetric::Cosine)
            .await
            .unwrap();
        assert_eq!(reopened.metric, SimilarityMetric::Euclidean);

        let second = index
            .create_or_open("second", SimilarityMetric::Cosine)
            .await
            .unwrap();
        index.insert(&first, entry("a", vec![1.0])).await.unwrap();

        assert_eq!(index.count(&first).await.unwrap(), 1);
        assert_eq!(index.count(&second).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn get_all_returns_insertion_order_and_clear_empties() {
        let dir = tempfile::tempdir().unwrap();
        let index = test_index(&dir).await;
        let collection = index
            .create_or_open("recipes", SimilarityMetric::Cosine)
            .await
            .unwrap();

        for id in ["z", "m", "a"] {
            index.insert(&collection, entry(id, vec![1.0])).await.unwrap();
        }

        let all = index.get_all(&collection).await.unwrap();
        let ids: Vec<&str> = all.iter().filter_map(|m| m["id"].as_str()).collect();
        assert_eq!(ids, vec!["z", "m", "a"]);

        assert_eq!(index.clear(&collection).await.unwrap(), 3);
        assert_eq!(index.count(&collection).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let index = test_index(&dir).await;
            let collection = index
                .create_or_open("recipes", SimilarityMetric::Cosine)
                .await
                .unwrap();
            index.insert(&collection, entry("kept", vec![1.0, 0.0])).await.unwrap();
            index.pool.close().await;
        }

        let index = test_index(&dir).await;
        let collection = index
            .create_or_open("recipes", SimilarityMetric::Cosine)
            .await
            .unwrap();
        assert_eq!(
            index.fingerprint(&collection, "kept").await.unwrap().as_deref(),
            Some("fp-kept")
        );
    }

    #[tokio::test]
    async fn unopenable_path_is_store_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let err = SqliteIndex::open(blocker.join("index.db")).await.err().unwrap();
        assert!(matches!(err, RagError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn query_skips_vectors_of_another_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let index = test_index(&dir).await;
        let collection = index
            .create_or_open("recipes", SimilarityMetric::Cosine)
            .await
            .unwrap();

        for (id, embedding) in [
            ("old_a", vec![1.0, 0.0, 0.0]),
            ("old_b", vec![0.0, 1.0, 0.0]),
            ("new", vec![1.0, 0.0]),
        ] {
            index.insert(&collection, entry(id, embedding)).await.unwrap();
        }

        let hits = index.query(&collection, &[1.0, 0.0], 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "new");

        let none = index.query(&collection, &[1.0, 0.0, 0.0, 0.0], 3).await.unwrap();
        assert!(none.is_empty());
    }
}
