//! Fact indexing and retrieval-augmented answering.
//!
//! Index: texts are embedded in one batch, persisted to the fact store and
//! inserted into the vector index under the same integer ID.
//! Chat: the query is embedded, searched, threshold-filtered, resolved back
//! to fact texts and answered by the language model from those facts only.

pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod indexer;
pub mod rag;
pub mod retriever;
pub mod store;
pub mod types;
pub mod vector;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use chunking::{chunk_text, collect_documents, DocumentChunk};
pub use config::{EmptyContextPolicy, GenerationConfig, RetrievalConfig};
pub use embeddings::{create_provider, EmbeddingProvider};
pub use indexer::{IndexReport, Indexer, ItemOutcome};
pub use rag::{AnswerGenerator, ChatAnswer, ChatStage, RagService, ServiceStats, StageTracker};
pub use retriever::{Retrieval, Retriever};
pub use store::{FactStore, SqliteFactStore};
pub use types::{Metric, NewFact, SearchHit, SearchParams, StoredFact, VectorEntry};
pub use vector::{create_index, SqliteVectorIndex, VectorIndex};
