//! Indexing: raw texts -> fact records + vector entries.

use crate::embeddings::EmbeddingProvider;
use crate::store::FactStore;
use crate::types::{NewFact, VectorEntry};
use crate::vector::VectorIndex;
use factrag_core::{AppError, AppResult};
use serde::Serialize;
use std::sync::Arc;

/// What happened to one input item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Fact record and vector entry both written under `id`.
    Indexed { id: i64 },
    /// The fact record could not be created; nothing was written.
    StoreFailed { error: String },
    /// The fact record `id` exists but its vector entry does not.
    VectorInsertFailed { id: i64, error: String },
}

/// Per-item outcomes of one Index call, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl IndexReport {
    pub fn indexed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ItemOutcome::Indexed { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.indexed()
    }

    /// IDs that made it into both stores.
    pub fn indexed_ids(&self) -> Vec<i64> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                ItemOutcome::Indexed { id } => Some(*id),
                _ => None,
            })
            .collect()
    }
}

pub struct Indexer {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn FactStore>,
    index: Arc<dyn VectorIndex>,
}

impl Indexer {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn FactStore>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            embedder,
            store,
            index,
        }
    }

    /// Index a batch of texts.
    ///
    /// One embedding call covers the whole batch; if it fails nothing is
    /// written. After that every item is attempted exactly once: a store
    /// failure skips the item, a vector failure leaves the fact record in
    /// place (orphaned, never rolled back).
    pub async fn index(&self, texts: &[String]) -> AppResult<IndexReport> {
        if texts.is_empty() {
            return Err(AppError::Validation("facts: cannot be blank".to_string()));
        }

        tracing::info!(items = texts.len(), "Begin task Index");

        let vectors = self.embedder.embed_batch(texts).await.map_err(|e| {
            tracing::error!(operation = "EmbedBatch", error = %e, "Embedding failed");
            e
        })?;

        if vectors.len() != texts.len() {
            let e = AppError::Provider(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            ));
            tracing::error!(operation = "EmbedBatch", error = %e, "Embedding failed");
            return Err(e);
        }

        let mut report = IndexReport::default();

        for (text, vector) in texts.iter().zip(vectors) {
            let fact = NewFact {
                text: text.clone(),
                vector,
                visible: true,
            };

            let id = match self.store.create(&fact).await {
                Ok(id) => id,
                Err(e) => {
                    tracing::error!(operation = "CreateFact", error = %e, "Skipping item");
                    report.outcomes.push(ItemOutcome::StoreFailed {
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let entry = VectorEntry {
                id,
                vector: fact.vector,
                visible: true,
            };

            match self.index.insert(&entry).await {
                Ok(()) => report.outcomes.push(ItemOutcome::Indexed { id }),
                Err(e) => {
                    tracing::error!(operation = "InsertVector", id, error = %e, "Fact left without vector");
                    report.outcomes.push(ItemOutcome::VectorInsertFailed {
                        id,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            indexed = report.indexed(),
            failed = report.failed(),
            "End task Index"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let report = IndexReport {
            outcomes: vec![
                ItemOutcome::Indexed { id: 1 },
                ItemOutcome::StoreFailed {
                    error: "locked".to_string(),
                },
                ItemOutcome::VectorInsertFailed {
                    id: 3,
                    error: "timeout".to_string(),
                },
                ItemOutcome::Indexed { id: 4 },
            ],
        };

        assert_eq!(report.indexed(), 2);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.indexed_ids(), vec![1, 4]);
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(ItemOutcome::VectorInsertFailed {
            id: 9,
            error: "down".to_string(),
        })
        .unwrap();
        assert_eq!(json["status"], "vector_insert_failed");
        assert_eq!(json["id"], 9);
    }
}
