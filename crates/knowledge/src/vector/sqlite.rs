//! Local vector index over SQLite with exact (brute-force) scoring.

use super::{check_collection_name, rank, VectorIndex};
use crate::types::{bytes_to_vector, vector_to_bytes, SearchHit, SearchParams, VectorEntry};
use factrag_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed vector index. One table per collection.
pub struct SqliteVectorIndex {
    conn: Mutex<Connection>,
    collection: String,
    dimensions: usize,
}

impl SqliteVectorIndex {
    pub fn open(db_path: &Path, collection: &str, dimensions: usize) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::VectorIndex(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::VectorIndex(format!("Failed to open SQLite index: {}", e)))?;

        Self::with_connection(conn, collection, dimensions)
    }

    pub fn open_in_memory(collection: &str, dimensions: usize) -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::VectorIndex(format!("Failed to open SQLite index: {}", e)))?;
        Self::with_connection(conn, collection, dimensions)
    }

    fn with_connection(conn: Connection, collection: &str, dimensions: usize) -> AppResult<Self> {
        check_collection_name(collection)?;
        Ok(Self {
            conn: Mutex::new(conn),
            collection: collection.to_string(),
            dimensions,
        })
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::VectorIndex("Vector index lock poisoned".to_string()))
    }

    fn check_dimensions(&self, vector: &[f32]) -> AppResult<()> {
        if vector.len() != self.dimensions {
            return Err(AppError::VectorIndex(format!(
                "Vector dimension mismatch: expected {}, got {}",
                self.dimensions,
                vector.len()
            )));
        }
        Ok(())
    }

    /// Translate the supported filter expressions into SQL.
    fn filter_clause(filter: Option<&str>) -> AppResult<&'static str> {
        let normalized = filter.map(|f| f.split_whitespace().collect::<Vec<_>>().join(" "));
        match normalized.as_deref() {
            None | Some("") => Ok(""),
            Some("is_visible == true") => Ok(" WHERE is_visible = 1"),
            Some("is_visible == false") => Ok(" WHERE is_visible = 0"),
            Some(other) => Err(AppError::VectorIndex(format!(
                "Unsupported filter for sqlite backend: {}",
                other
            ))),
        }
    }
}

#[async_trait::async_trait]
impl VectorIndex for SqliteVectorIndex {
    fn backend_name(&self) -> &str {
        "sqlite"
    }

    async fn init_collection(&self) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                dimensions INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS "{}" (
                id INTEGER PRIMARY KEY,
                is_visible INTEGER NOT NULL,
                vector BLOB NOT NULL
            );
            "#,
            self.collection
        ))
        .map_err(|e| AppError::VectorIndex(format!("Failed to create collection: {}", e)))?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT dimensions FROM collections WHERE name = ?1",
                params![self.collection],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AppError::VectorIndex(format!("Failed to read collection: {}", e)))?;

        match existing {
            Some(dims) if dims as usize != self.dimensions => Err(AppError::VectorIndex(format!(
                "Collection '{}' has dimension {}, configured {}",
                self.collection, dims, self.dimensions
            ))),
            Some(_) => Ok(()),
            None => {
                conn.execute(
                    "INSERT INTO collections (name, dimensions) VALUES (?1, ?2)",
                    params![self.collection, self.dimensions as i64],
                )
                .map_err(|e| {
                    AppError::VectorIndex(format!("Failed to register collection: {}", e))
                })?;
                tracing::debug!("Created collection '{}'", self.collection);
                Ok(())
            }
        }
    }

    async fn insert(&self, entry: &VectorEntry) -> AppResult<()> {
        self.check_dimensions(&entry.vector)?;

        let conn = self.lock()?;
        conn.execute(
            &format!(
                r#"INSERT INTO "{}" (id, is_visible, vector) VALUES (?1, ?2, ?3)"#,
                self.collection
            ),
            params![entry.id, entry.visible, vector_to_bytes(&entry.vector)],
        )
        .map_err(|e| AppError::VectorIndex(format!("Failed to insert vector {}: {}", entry.id, e)))?;

        Ok(())
    }

    async fn search(&self, query: &[f32], params: &SearchParams) -> AppResult<Vec<SearchHit>> {
        self.check_dimensions(query)?;

        if !params.partitions.is_empty() {
            return Err(AppError::VectorIndex(
                "Partitions are not supported by the sqlite backend".to_string(),
            ));
        }

        let where_clause = Self::filter_clause(params.filter.as_deref())?;

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                r#"SELECT id, vector FROM "{}"{}"#,
                self.collection, where_clause
            ))
            .map_err(|e| AppError::VectorIndex(format!("Failed to prepare search: {}", e)))?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)))
            .map_err(|e| AppError::VectorIndex(format!("Failed to scan vectors: {}", e)))?;

        let mut hits = Vec::new();
        for row in rows {
            let (id, blob) =
                row.map_err(|e| AppError::VectorIndex(format!("Failed to read vector: {}", e)))?;
            let vector = bytes_to_vector(&blob)?;
            hits.push(SearchHit {
                id,
                score: params.metric.score(query, &vector),
            });
        }

        let hits = rank(hits, params.top_k);
        tracing::debug!(
            "Retrieved {} vectors (requested top-{})",
            hits.len(),
            params.top_k
        );

        Ok(hits)
    }

    async fn count(&self) -> AppResult<u64> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(r#"SELECT COUNT(*) FROM "{}""#, self.collection),
            [],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n as u64)
        .map_err(|e| AppError::VectorIndex(format!("Failed to count vectors: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metric;
    use tempfile::NamedTempFile;

    fn normalize(v: &[f32]) -> Vec<f32> {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.iter().map(|x| x / norm).collect()
    }

    fn entry(id: i64, vector: Vec<f32>) -> VectorEntry {
        VectorEntry {
            id,
            vector,
            visible: true,
        }
    }

    async fn index(dimensions: usize) -> SqliteVectorIndex {
        let index = SqliteVectorIndex::open_in_memory("facts", dimensions).unwrap();
        index.init_collection().await.unwrap();
        index
    }

    #[tokio::test]
    async fn test_relevant_query_ranks_first() {
        let index = index(4).await;
        index
            .insert(&entry(1, normalize(&[1.0, 0.5, 0.2, 0.1])))
            .await
            .unwrap();
        index
            .insert(&entry(2, normalize(&[-0.3, -0.8, 0.4, -0.2])))
            .await
            .unwrap();

        let query = normalize(&[0.9, 0.4, 0.3, 0.1]);
        let hits = index
            .search(&query, &SearchParams::new(5, Metric::InnerProduct))
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, 1);
        assert!(hits[0].score > 0.9);
        assert!(hits[1].score < 0.0);
    }

    #[tokio::test]
    async fn test_top_k_limits_results() {
        let index = index(2).await;
        for id in 1..=10 {
            index
                .insert(&entry(id, vec![id as f32, 1.0]))
                .await
                .unwrap();
        }

        let hits = index
            .search(&[1.0, 0.0], &SearchParams::new(3, Metric::InnerProduct))
            .await
            .unwrap();
        assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![10, 9, 8]);
    }

    #[tokio::test]
    async fn test_visibility_filter() {
        let index = index(2).await;
        index.insert(&entry(1, vec![1.0, 0.0])).await.unwrap();
        index
            .insert(&VectorEntry {
                id: 2,
                vector: vec![1.0, 0.0],
                visible: false,
            })
            .await
            .unwrap();

        let params = SearchParams::new(5, Metric::Cosine).with_filter("is_visible == true");
        let hits = index.search(&[1.0, 0.0], &params).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);

        let bad = SearchParams::new(5, Metric::Cosine).with_filter("id > 3");
        assert!(index.search(&[1.0, 0.0], &bad).await.is_err());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let index = index(3).await;
        assert!(index.insert(&entry(1, vec![1.0, 0.0])).await.is_err());
        assert!(index
            .search(&[1.0], &SearchParams::new(1, Metric::InnerProduct))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let index = index(2).await;
        index.insert(&entry(7, vec![1.0, 0.0])).await.unwrap();
        assert!(index.insert(&entry(7, vec![0.0, 1.0])).await.is_err());
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reopen_with_other_dimension_fails() {
        let temp_file = NamedTempFile::new().unwrap();
        {
            let index = SqliteVectorIndex::open(temp_file.path(), "facts", 4).unwrap();
            index.init_collection().await.unwrap();
            index.init_collection().await.unwrap();
        }

        let index = SqliteVectorIndex::open(temp_file.path(), "facts", 8).unwrap();
        assert!(index.init_collection().await.is_err());
    }
}
