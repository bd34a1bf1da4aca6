//! LanceDB-backed vector index (embedded, on-disk).

use super::{check_collection_name, rank, VectorIndex};
use crate::types::{Metric, SearchHit, SearchParams, VectorEntry};
use arrow_array::{
    Array, BooleanArray, FixedSizeListArray, Float32Array, Int64Array, RecordBatch,
    RecordBatchIterator,
};
use arrow_schema::{DataType, Field, Schema};
use factrag_core::{AppError, AppResult};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub struct LanceDbIndex {
    conn: Connection,
    table: OnceCell<Table>,
    collection: String,
    dimensions: usize,
}

impl LanceDbIndex {
    /// Connect to the database directory at `db_path`.
    pub async fn connect(db_path: &Path, collection: &str, dimensions: usize) -> AppResult<Self> {
        check_collection_name(collection)?;

        std::fs::create_dir_all(db_path).map_err(|e| {
            AppError::VectorIndex(format!("Failed to create index directory: {}", e))
        })?;

        let uri = db_path.to_string_lossy().to_string();
        let conn = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| AppError::VectorIndex(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            conn,
            table: OnceCell::new(),
            collection: collection.to_string(),
            dimensions,
        })
    }

    fn schema(dimensions: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("is_visible", DataType::Boolean, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimensions as i32,
                ),
                false,
            ),
        ]))
    }

    async fn open_or_create(&self) -> AppResult<Table> {
        let names = self
            .conn
            .table_names()
            .execute()
            .await
            .map_err(|e| AppError::VectorIndex(format!("Failed to list tables: {}", e)))?;

        if names.contains(&self.collection) {
            return self
                .conn
                .open_table(&self.collection)
                .execute()
                .await
                .map_err(|e| AppError::VectorIndex(format!("Failed to open table: {}", e)));
        }

        tracing::info!("Creating LanceDB table '{}'", self.collection);
        let schema = Self::schema(self.dimensions);
        let empty = RecordBatch::new_empty(schema.clone());
        self.conn
            .create_table(
                &self.collection,
                RecordBatchIterator::new(vec![Ok(empty)], schema),
            )
            .execute()
            .await
            .map_err(|e| AppError::VectorIndex(format!("Failed to create table: {}", e)))
    }

    async fn table(&self) -> AppResult<&Table> {
        self.table.get_or_try_init(|| self.open_or_create()).await
    }

    fn to_batch(&self, entry: &VectorEntry) -> AppResult<RecordBatch> {
        let values = Float32Array::from(entry.vector.clone());
        let vectors = FixedSizeListArray::new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.dimensions as i32,
            Arc::new(values),
            None,
        );

        RecordBatch::try_new(
            Self::schema(self.dimensions),
            vec![
                Arc::new(Int64Array::from(vec![entry.id])),
                Arc::new(BooleanArray::from(vec![entry.visible])),
                Arc::new(vectors),
            ],
        )
        .map_err(|e| AppError::VectorIndex(format!("Failed to build record batch: {}", e)))
    }
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> AppResult<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| AppError::VectorIndex(format!("Invalid {} column", name)))
}

#[async_trait::async_trait]
impl VectorIndex for LanceDbIndex {
    fn backend_name(&self) -> &str {
        "lancedb"
    }

    async fn init_collection(&self) -> AppResult<()> {
        self.table().await.map(|_| ())
    }

    async fn insert(&self, entry: &VectorEntry) -> AppResult<()> {
        if entry.vector.len() != self.dimensions {
            return Err(AppError::VectorIndex(format!(
                "Vector dimension mismatch: expected {}, got {}",
                self.dimensions,
                entry.vector.len()
            )));
        }

        let batch = self.to_batch(entry)?;
        let schema = batch.schema();
        self.table()
            .await?
            .add(RecordBatchIterator::new(vec![Ok(batch)], schema))
            .execute()
            .await
            .map_err(|e| AppError::VectorIndex(format!("Failed to add vector: {}", e)))?;

        Ok(())
    }

    async fn search(&self, query: &[f32], params: &SearchParams) -> AppResult<Vec<SearchHit>> {
        if query.len() != self.dimensions {
            return Err(AppError::VectorIndex(format!(
                "Query dimension mismatch: expected {}, got {}",
                self.dimensions,
                query.len()
            )));
        }
        if !params.partitions.is_empty() {
            return Err(AppError::VectorIndex(
                "Partitions are not supported by the lancedb backend".to_string(),
            ));
        }

        let mut vector_query = self
            .table()
            .await?
            .query()
            .nearest_to(query.to_vec())
            .map_err(|e| AppError::VectorIndex(format!("Failed to create query: {}", e)))?
            .distance_type(distance_type(params.metric))
            .limit(params.top_k);

        if let Some(ref filter) = params.filter {
            vector_query = vector_query.only_if(filter.clone());
        }

        let batches = vector_query
            .execute()
            .await
            .map_err(|e| AppError::VectorIndex(format!("Failed to execute search: {}", e)))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| AppError::VectorIndex(format!("Failed to collect results: {}", e)))?;

        // Score locally so every backend reports the same metric
        let mut hits = Vec::new();
        for batch in &batches {
            let ids = column::<Int64Array>(batch, "id")?;
            let vectors = column::<FixedSizeListArray>(batch, "vector")?;

            for row in 0..batch.num_rows() {
                let values = vectors.value(row);
                let values = values
                    .as_any()
                    .downcast_ref::<Float32Array>()
                    .ok_or_else(|| AppError::VectorIndex("Invalid vector values".to_string()))?;
                let candidate: Vec<f32> = values.values().to_vec();

                hits.push(SearchHit {
                    id: ids.value(row),
                    score: params.metric.score(query, &candidate),
                });
            }
        }

        Ok(rank(hits, params.top_k))
    }

    async fn count(&self) -> AppResult<u64> {
        self.table()
            .await?
            .count_rows(None)
            .await
            .map(|n| n as u64)
            .map_err(|e| AppError::VectorIndex(format!("Failed to count rows: {}", e)))
    }
}

/// Candidate selection has to use the same metric the hits are scored with.
fn distance_type(metric: Metric) -> DistanceType {
    match metric {
        Metric::InnerProduct => DistanceType::Dot,
        Metric::Cosine => DistanceType::Cosine,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_insert_and_search() {
        let temp = TempDir::new().unwrap();
        let index = LanceDbIndex::connect(&temp.path().join("lancedb"), "facts", 3)
            .await
            .unwrap();
        index.init_collection().await.unwrap();

        for (id, v) in [(1, [1.0, 0.0, 0.0]), (2, [0.0, 1.0, 0.0])] {
            index
                .insert(&VectorEntry {
                    id,
                    vector: v.to_vec(),
                    visible: true,
                })
                .await
                .unwrap();
        }

        assert_eq!(index.count().await.unwrap(), 2);

        let hits = index
            .search(&[0.9, 0.1, 0.0], &SearchParams::new(2, Metric::InnerProduct))
            .await
            .unwrap();
        assert_eq!(hits[0].id, 1);
    }

    #[tokio::test]
    async fn test_search_selects_by_inner_product() {
        let temp = TempDir::new().unwrap();
        let index = LanceDbIndex::connect(&temp.path().join("lancedb"), "facts", 3)
            .await
            .unwrap();
        index.init_collection().await.unwrap();

        // id 1 is the L2-nearest neighbour, id 2 has the larger inner product
        for (id, v) in [(1, [1.0, 0.0, 0.0]), (2, [10.0, 0.0, 0.0])] {
            index
                .insert(&VectorEntry {
                    id,
                    vector: v.to_vec(),
                    visible: true,
                })
                .await
                .unwrap();
        }

        let hits = index
            .search(&[1.0, 0.0, 0.0], &SearchParams::new(1, Metric::InnerProduct))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 2);
        assert!((hits[0].score - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_distance_type_follows_metric() {
        assert_eq!(distance_type(Metric::InnerProduct), DistanceType::Dot);
        assert_eq!(distance_type(Metric::Cosine), DistanceType::Cosine);
    }
}
