//! PersistentIndex trait: the abstract interface for vector index backends.
//!
//! The primary implementation is `SqliteIndex` in the `sqlite` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::RagError;
use crate::vector_math;

/// Similarity metric a collection is created with. Fixed for the collection's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    #[default]
    Cosine,
    DotProduct,
    Euclidean,
}

impl SimilarityMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityMetric::Cosine => "cosine",
            SimilarityMetric::DotProduct => "dot_product",
            SimilarityMetric::Euclidean => "euclidean",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cosine" => Some(SimilarityMetric::Cosine),
            "dot_product" => Some(SimilarityMetric::DotProduct),
            "euclidean" => Some(SimilarityMetric::Euclidean),
            _ => None,
        }
    }

    /// Relevance score where higher is always better.
    pub fn score(&self, query: &[f32], candidate: &[f32]) -> Option<f32> {
        match self {
            SimilarityMetric::Cosine => vector_math::cosine_similarity(query, candidate),
            SimilarityMetric::DotProduct => vector_math::dot_product(query, candidate),
            SimilarityMetric::Euclidean => {
                vector_math::euclidean_distance(query, candidate).map(|d| -d)
            }
        }
    }
}

/// An opened collection inside an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionHandle {
    pub name: String,
    pub metric: SimilarityMetric,
}

/// A document as handed to the index for storage.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: String,
    pub text: String,
    pub fingerprint: String,
    pub metadata: Value,
    pub embedding: Vec<f32>,
}

/// A similarity match.
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub id: String,
    pub metadata: Value,
    pub score: f32,
}

#[async_trait]
pub trait PersistentIndex: Send + Sync {
    /// Attach to `name`, creating it with `metric` if absent.
    ///
    /// An existing collection keeps the metric it was created with.
    async fn create_or_open(
        &self,
        name: &str,
        metric: SimilarityMetric,
    ) -> Result<CollectionHandle, RagError>;

    /// Insert one entry. Returns `false` without writing when the id already exists.
    async fn insert(&self, collection: &CollectionHandle, entry: IndexEntry)
        -> Result<bool, RagError>;

    /// Insert entries in one transaction: either all new ids land or none do.
    ///
    /// Returns the number of rows written (existing ids are skipped).
    async fn insert_batch(
        &self,
        collection: &CollectionHandle,
        entries: Vec<IndexEntry>,
    ) -> Result<usize, RagError>;

    /// Stored content fingerprint for `id`, if present.
    async fn fingerprint(
        &self,
        collection: &CollectionHandle,
        id: &str,
    ) -> Result<Option<String>, RagError>;

    /// Up to `top_k` hits ordered by score descending, ties by id ascending.
    async fn query(
        &self,
        collection: &CollectionHandle,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<IndexHit>, RagError>;

    /// Metadata of every entry, in insertion order.
    async fn get_all(&self, collection: &CollectionHandle) -> Result<Vec<Value>, RagError>;

    async fn count(&self, collection: &CollectionHandle) -> Result<usize, RagError>;

    /// Remove every entry of the collection. Returns how many were removed.
    async fn clear(&self, collection: &CollectionHandle) -> Result<usize, RagError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_round_trip() {
        for metric in [
            SimilarityMetric::Cosine,
            SimilarityMetric::DotProduct,
            SimilarityMetric::Euclidean,
        ] {
            assert_eq!(SimilarityMetric::parse(metric.as_str()), Some(metric));
        }
        assert_eq!(SimilarityMetric::parse("manhattan"), None);
    }

    #[test]
    fn euclidean_score_prefers_closer_vectors() {
        let metric = SimilarityMetric::Euclidean;
        let near = metric.score(&[0.0, 0.0], &[1.0, 0.0]).unwrap();
        let far = metric.score(&[0.0, 0.0], &[3.0, 4.0]).unwrap();
        assert!(near > far);
    }
}
