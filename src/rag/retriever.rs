use std::sync::Arc;

use super::document_store::DocumentStore;
use super::record::RetrievalResult;
use crate::core::errors::RagError;

/// Query-time facade over the store.
///
/// Grounding is best-effort: store or embedding failures degrade to an empty
/// result. Only an invalid `top_k` is reported to the caller.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<DocumentStore>,
}

impl Retriever {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn query(&self, text: &str, top_k: usize) -> Result<RetrievalResult, RagError> {
        if top_k == 0 {
            return Err(RagError::InvalidArgument("top_k must be at least 1".to_string()));
        }

        let available = match self.store.count().await {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!("Retrieval skipped, store count failed: {}", err);
                return Ok(RetrievalResult::empty());
            }
        };
        if available == 0 {
            tracing::debug!("Retrieval skipped, collection is empty");
            return Ok(RetrievalResult::empty());
        }

        match self.store.query(text, top_k.min(available)).await {
            Ok(result) => {
                tracing::debug!("Retrieved {:?} for query", result.ids());
                Ok(result)
            }
            Err(err) => {
                tracing::warn!(
                    kind = err.kind(),
                    "Retrieval degraded to empty context: {}",
                    err
                );
                Ok(RetrievalResult::empty())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::IngestFailurePolicy;
    use crate::test_support::{recipe, temp_store, KeywordEmbedder};

    async fn retriever_with(n: usize, embedder: KeywordEmbedder) -> (tempfile::TempDir, Retriever) {
        let (dir, store) = temp_store(embedder, IngestFailurePolicy::Progressive).await;
        let records: Vec<_> = (0..n)
            .map(|i| recipe(&format!("recipe_{}", i), &format!("Dish {}", i), "flour butter"))
            .collect();
        store.add_batch(&records).await.unwrap();
        (dir, Retriever::new(Arc::new(store)))
    }

    #[tokio::test]
    async fn result_length_is_min_of_k_and_store_size() {
        for (n, k) in [(0usize, 3usize), (2, 3), (3, 3), (5, 3), (5, 1)] {
            let (_dir, retriever) = retriever_with(n, KeywordEmbedder::recipes()).await;
            let result = retriever.query("flour", k).await.unwrap();
            assert_eq!(result.len(), k.min(n), "n={} k={}", n, k);
        }
    }

    #[tokio::test]
    async fn zero_top_k_is_invalid() {
        let (_dir, retriever) = retriever_with(1, KeywordEmbedder::recipes()).await;
        let err = retriever.query("flour", 0).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn embedding_failure_degrades_to_empty() {
        let embedder = KeywordEmbedder::recipes().failing_on("unreachable");
        let (_dir, retriever) = retriever_with(2, embedder).await;

        let result = retriever.query("unreachable topic", 2).await.unwrap();
        assert!(result.is_empty());
    }
}
