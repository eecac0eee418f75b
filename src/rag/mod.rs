//! Retrieval: the persistent document store, the query-time retriever and
//! context composition for grounded prompts.

pub mod context_builder;
pub mod corpus;
pub mod document_store;
pub mod ingestion;
pub mod record;
pub mod retriever;
pub mod sqlite;
pub mod store;

pub use context_builder::{ContextComposer, ContextLimits, NO_CONTEXT_SENTINEL};
pub use corpus::{load_corpus_file, sample_recipes, CorpusEntry};
pub use document_store::{DocumentStore, IngestFailurePolicy, IngestReport, StoreOptions};
pub use ingestion::IngestionGate;
pub use record::{DocumentRecord, RankedRecord, RecordFields, RetrievalResult};
pub use retriever::Retriever;
pub use sqlite::SqliteIndex;
pub use store::{CollectionHandle, IndexEntry, IndexHit, PersistentIndex, SimilarityMetric};
