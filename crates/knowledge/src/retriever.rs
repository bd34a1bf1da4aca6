//! Retrieval: query -> ranked, threshold-filtered fact texts.

use crate::config::RetrievalConfig;
use crate::embeddings::EmbeddingProvider;
use crate::rag::stage::{ChatStage, StageTracker};
use crate::store::FactStore;
use crate::types::{SearchHit, SearchParams};
use crate::vector::VectorIndex;
use factrag_core::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Facts relevant to a query, best first.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    /// Fact texts, ordered by descending score
    pub facts: Vec<String>,
    /// The `(id, score)` pairs behind `facts`, same order
    pub hits: Vec<SearchHit>,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn FactStore>,
    index: Arc<dyn VectorIndex>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn FactStore>,
        index: Arc<dyn VectorIndex>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            index,
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub async fn retrieve(&self, query: &str) -> AppResult<Retrieval> {
        self.retrieve_tracked(query, &mut StageTracker::new()).await
    }

    /// Retrieve while reporting each pipeline stage to `tracker`.
    pub async fn retrieve_tracked(
        &self,
        query: &str,
        tracker: &mut StageTracker,
    ) -> AppResult<Retrieval> {
        tracker.advance(ChatStage::Embedding);
        let mut vectors = self
            .embedder
            .embed_batch(&[query.to_string()])
            .await
            .map_err(|e| tracker.fail(e))?;
        let query_vector = match vectors.pop() {
            Some(v) if vectors.is_empty() && !v.is_empty() => v,
            _ => {
                return Err(tracker.fail(AppError::Provider(
                    "Query embedding came back empty".to_string(),
                )))
            }
        };

        tracker.advance(ChatStage::Searching);
        let mut params = SearchParams::new(self.config.top_k, self.config.metric);
        params.filter = self.config.filter.clone();

        let candidates = self
            .index
            .search(&query_vector, &params)
            .await
            .map_err(|e| tracker.fail(e))?;

        if candidates.is_empty() {
            return Err(tracker.fail(AppError::NoData(format!(
                "No vectors found in collection '{}'",
                self.config.collection
            ))));
        }

        tracker.advance(ChatStage::Filtering);
        let threshold = self.config.score_threshold;
        let total = candidates.len();
        let survivors: Vec<SearchHit> = candidates
            .into_iter()
            .filter(|hit| hit.score >= threshold)
            .collect();

        tracing::debug!(
            candidates = total,
            kept = survivors.len(),
            threshold,
            "Applied score threshold"
        );

        if survivors.is_empty() {
            tracing::info!("No relevant facts (all scores below {:.2} threshold)", threshold);
            return Ok(Retrieval::default());
        }

        tracker.advance(ChatStage::Resolving);
        let ids: Vec<i64> = survivors.iter().map(|h| h.id).collect();
        let found = self
            .store
            .get_facts(&ids)
            .await
            .map_err(|e| tracker.fail(e))?;

        // Lookup order is not guaranteed; re-rank by the search order.
        let mut by_id: HashMap<i64, String> = found.into_iter().map(|f| (f.id, f.text)).collect();

        let mut retrieval = Retrieval::default();
        for hit in survivors {
            match by_id.remove(&hit.id) {
                Some(text) => {
                    retrieval.facts.push(text);
                    retrieval.hits.push(hit);
                }
                None => tracing::warn!(id = hit.id, "Vector has no visible fact record"),
            }
        }

        tracing::info!(
            facts = retrieval.facts.len(),
            top_score = retrieval.hits.first().map(|h| h.score).unwrap_or(0.0),
            "Retrieved relevant facts"
        );

        Ok(retrieval)
    }
}
