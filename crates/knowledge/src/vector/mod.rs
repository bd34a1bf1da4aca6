//! Vector index abstraction and backend adapters.
//!
//! One trait, one adapter per backend. The backend is chosen once at
//! startup by [`create_index`]; nothing downstream branches on it.

#[cfg(feature = "lancedb")]
pub mod lance;
pub mod milvus;
pub mod sqlite;

pub use milvus::MilvusIndex;
pub use sqlite::SqliteVectorIndex;

use crate::types::{Metric, SearchHit, SearchParams, VectorEntry};
use factrag_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Trait for vector index backends.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name (e.g., "sqlite", "milvus")
    fn backend_name(&self) -> &str;

    /// Create the collection with dimension `D` if absent, then make it
    /// queryable. Idempotent.
    async fn init_collection(&self) -> AppResult<()>;

    /// Insert one entry. `entry.id` must be an existing fact ID.
    async fn insert(&self, entry: &VectorEntry) -> AppResult<()>;

    /// Top-k nearest neighbours, descending by score.
    async fn search(&self, query: &[f32], params: &SearchParams) -> AppResult<Vec<SearchHit>>;

    /// Number of stored entries.
    async fn count(&self) -> AppResult<u64>;
}

/// Validate a collection name for use as a table/collection identifier.
pub(crate) fn check_collection_name(name: &str) -> AppResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "Invalid collection name '{}': use letters, digits and underscores",
            name
        )))
    }
}

/// Keep the `top_k` best hits, best first. NaN scores (overflowed inner
/// products) never rank.
pub(crate) fn rank(mut hits: Vec<SearchHit>, top_k: usize) -> Vec<SearchHit> {
    hits.retain(|hit| !hit.score.is_nan());
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(top_k);
    hits
}

/// Build the configured backend and initialise its collection.
pub async fn create_index(config: &AppConfig) -> AppResult<Arc<dyn VectorIndex>> {
    let collection = &config.vector.collection;
    let dimensions = config.embedding.effective_dimensions();
    let metric = Metric::parse(&config.vector.metric)?;

    let index: Arc<dyn VectorIndex> = match config.vector.backend.as_str() {
        "sqlite" => Arc::new(SqliteVectorIndex::open(
            &config.vector_path(),
            collection,
            dimensions,
        )?),
        "milvus" => {
            let endpoint = config.vector.endpoint.as_deref().ok_or_else(|| {
                AppError::Config("Milvus backend requires vector.endpoint".to_string())
            })?;
            let token = std::env::var(&config.vector.token_env).ok();
            Arc::new(MilvusIndex::new(
                endpoint,
                token,
                collection,
                dimensions,
                metric,
                Duration::from_secs(config.vector.timeout_secs),
            )?)
        }
        #[cfg(feature = "lancedb")]
        "lancedb" => Arc::new(
            lance::LanceDbIndex::connect(&config.vector_path(), collection, dimensions)
                .await?,
        ),
        #[cfg(not(feature = "lancedb"))]
        "lancedb" => {
            return Err(AppError::Config(
                "LanceDB backend requires building with the `lancedb` feature".to_string(),
            ))
        }
        other => {
            return Err(AppError::Config(format!(
                "Unknown vector backend: {}",
                other
            )))
        }
    };

    index.init_collection().await?;
    tracing::info!(
        backend = index.backend_name(),
        collection = %collection,
        dimensions,
        "Vector index ready"
    );

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collection_names() {
        assert!(check_collection_name("facts").is_ok());
        assert!(check_collection_name("_movies_2024").is_ok());
        assert!(check_collection_name("").is_err());
        assert!(check_collection_name("2facts").is_err());
        assert!(check_collection_name("facts; DROP TABLE x").is_err());
    }

    #[test]
    fn test_rank_orders_and_truncates() {
        let hits = vec![
            SearchHit { id: 1, score: 0.2 },
            SearchHit { id: 2, score: 0.9 },
            SearchHit { id: 3, score: 0.5 },
        ];
        let ranked = rank(hits, 2);
        assert_eq!(ranked.iter().map(|h| h.id).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_rank_drops_nan_scores() {
        let big = [1e20f32, 1e20];
        let metric = Metric::InnerProduct;
        let hits: Vec<SearchHit> = (0..64)
            .map(|i| {
                let vector = if i % 3 == 0 { [1e20, -1e20] } else { [i as f32, 1.0] };
                SearchHit {
                    id: i,
                    score: metric.score(&big, &vector),
                }
            })
            .collect();
        assert!(hits.iter().any(|h| h.score.is_nan()));

        let ranked = rank(hits, 5);
        assert_eq!(ranked.len(), 5);
        assert!(ranked.iter().all(|h| !h.score.is_nan()));
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_create_sqlite_index_from_config() {
        let temp = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.workspace = temp.path().to_path_buf();
        config.embedding.dimensions = Some(4);

        let index = create_index(&config).await.unwrap();
        assert_eq!(index.backend_name(), "sqlite");
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(config.vector_path().exists());
    }

    #[tokio::test]
    async fn test_unknown_backend() {
        let mut config = AppConfig::default();
        config.vector.backend = "faiss".to_string();
        assert!(create_index(&config).await.is_err());
    }
}
