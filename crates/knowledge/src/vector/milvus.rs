//! Milvus adapter over the RESTful v2 API.
//!
//! Collection layout: `id` INT64 primary key (caller-assigned), `is_visible`
//! BOOL and `vector` FLOAT_VECTOR(D), indexed IVF_FLAT.

use super::{check_collection_name, VectorIndex};
use crate::types::{Metric, SearchHit, SearchParams, VectorEntry};
use factrag_core::{AppError, AppResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const INDEX_NLIST: u32 = 2048;
const SEARCH_NPROBE: u32 = 64;

/// Milvus REST envelope: `{"code": 0, "data": ..., "message": ...}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct HasData {
    has: bool,
}

#[derive(Debug, Deserialize)]
struct StatsData {
    #[serde(rename = "rowCount")]
    row_count: Value,
}

#[derive(Debug, Deserialize)]
struct SearchRow {
    id: Value,
    distance: f32,
}

pub struct MilvusIndex {
    client: Client,
    base_url: String,
    token: Option<String>,
    collection: String,
    dimensions: usize,
    metric: Metric,
}

impl MilvusIndex {
    pub fn new(
        endpoint: &str,
        token: Option<String>,
        collection: &str,
        dimensions: usize,
        metric: Metric,
        timeout: Duration,
    ) -> AppResult<Self> {
        check_collection_name(collection)?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::VectorIndex(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
            token,
            collection: collection.to_string(),
            dimensions,
            metric,
        })
    }

    async fn call<T: DeserializeOwned>(&self, path: &str, body: Value) -> AppResult<Option<T>> {
        let url = format!("{}/v2/vectordb/{}", self.base_url, path);
        let mut request = self.client.post(&url).json(&body);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::VectorIndex(format!("Milvus {} request failed: {}", path, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::VectorIndex(format!(
                "Milvus {} error ({}): {}",
                path, status, text
            )));
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            AppError::VectorIndex(format!("Failed to parse Milvus {} response: {}", path, e))
        })?;

        if envelope.code != 0 {
            return Err(AppError::VectorIndex(format!(
                "Milvus {} failed (code {}): {}",
                path,
                envelope.code,
                envelope.message.unwrap_or_default()
            )));
        }

        Ok(envelope.data)
    }

    fn create_body(&self) -> Value {
        json!({
            "collectionName": self.collection,
            "schema": {
                "autoId": false,
                "enableDynamicField": false,
                "fields": [
                    {"fieldName": "id", "dataType": "Int64", "isPrimary": true},
                    {"fieldName": "is_visible", "dataType": "Bool"},
                    {
                        "fieldName": "vector",
                        "dataType": "FloatVector",
                        "elementTypeParams": {"dim": self.dimensions.to_string()}
                    }
                ]
            },
            "indexParams": [{
                "fieldName": "vector",
                "indexName": "vector",
                "indexType": "IVF_FLAT",
                "metricType": self.metric.milvus_name(),
                "params": {"nlist": INDEX_NLIST}
            }]
        })
    }

    fn search_body(&self, query: &[f32], params: &SearchParams) -> Value {
        let mut body = json!({
            "collectionName": self.collection,
            "data": [query],
            "annsField": "vector",
            "limit": params.top_k,
            "outputFields": ["id"],
            "searchParams": {
                "metricType": params.metric.milvus_name(),
                "params": {"nprobe": SEARCH_NPROBE}
            }
        });

        if let Some(ref filter) = params.filter {
            body["filter"] = json!(filter);
        }
        if !params.partitions.is_empty() {
            body["partitionNames"] = json!(params.partitions);
        }
        body
    }
}

/// Milvus returns INT64 keys either as numbers or as strings.
fn parse_id(value: &Value) -> AppResult<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| AppError::VectorIndex(format!("Unexpected id in Milvus result: {}", value)))
}

#[async_trait::async_trait]
impl VectorIndex for MilvusIndex {
    fn backend_name(&self) -> &str {
        "milvus"
    }

    async fn init_collection(&self) -> AppResult<()> {
        let has: Option<HasData> = self
            .call(
                "collections/has",
                json!({"collectionName": self.collection}),
            )
            .await?;

        if !has.map(|h| h.has).unwrap_or(false) {
            tracing::info!(
                "Creating Milvus collection '{}' (dim {})",
                self.collection,
                self.dimensions
            );
            self.call::<Value>("collections/create", self.create_body())
                .await?;
        }

        self.call::<Value>(
            "collections/load",
            json!({"collectionName": self.collection}),
        )
        .await?;

        Ok(())
    }

    async fn insert(&self, entry: &VectorEntry) -> AppResult<()> {
        if entry.vector.len() != self.dimensions {
            return Err(AppError::VectorIndex(format!(
                "Vector dimension mismatch: expected {}, got {}",
                self.dimensions,
                entry.vector.len()
            )));
        }

        self.call::<Value>(
            "entities/insert",
            json!({
                "collectionName": self.collection,
                "data": [{
                    "id": entry.id,
                    "is_visible": entry.visible,
                    "vector": entry.vector,
                }]
            }),
        )
        .await?;

        Ok(())
    }

    async fn search(&self, query: &[f32], params: &SearchParams) -> AppResult<Vec<SearchHit>> {
        let rows: Option<Vec<SearchRow>> = self
            .call("entities/search", self.search_body(query, params))
            .await?;

        // IP and COSINE distances are similarities: larger is closer
        rows.unwrap_or_default()
            .into_iter()
            .map(|row| {
                Ok(SearchHit {
                    id: parse_id(&row.id)?,
                    score: row.distance,
                })
            })
            .collect()
    }

    async fn count(&self) -> AppResult<u64> {
        let stats: Option<StatsData> = self
            .call(
                "collections/get_stats",
                json!({"collectionName": self.collection}),
            )
            .await?;

        let row_count = stats.map(|s| s.row_count).unwrap_or(Value::from(0));
        match row_count {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
        .ok_or_else(|| AppError::VectorIndex("Unexpected rowCount from Milvus".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> MilvusIndex {
        MilvusIndex::new(
            "http://localhost:19530/",
            Some("root:Milvus".to_string()),
            "facts",
            512,
            Metric::InnerProduct,
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn test_create_body_schema() {
        let body = index().create_body();
        let fields = body["schema"]["fields"].as_array().unwrap();
        assert_eq!(fields[0]["fieldName"], "id");
        assert_eq!(fields[0]["isPrimary"], true);
        assert_eq!(body["schema"]["autoId"], false);
        assert_eq!(fields[2]["elementTypeParams"]["dim"], "512");
        assert_eq!(body["indexParams"][0]["indexType"], "IVF_FLAT");
        assert_eq!(body["indexParams"][0]["metricType"], "IP");
        assert_eq!(body["indexParams"][0]["params"]["nlist"], 2048);
    }

    #[test]
    fn test_search_body_defaults() {
        let params = SearchParams::new(5, Metric::InnerProduct);
        let body = index().search_body(&[0.1, 0.2], &params);
        assert_eq!(body["limit"], 5);
        assert_eq!(body["searchParams"]["params"]["nprobe"], 64);
        assert!(body.get("filter").is_none());
        assert!(body.get("partitionNames").is_none());
    }

    #[test]
    fn test_search_body_with_filter_and_partitions() {
        let mut params =
            SearchParams::new(3, Metric::Cosine).with_filter("is_visible == true");
        params.partitions = vec!["p2024".to_string()];
        let body = index().search_body(&[0.1], &params);
        assert_eq!(body["filter"], "is_visible == true");
        assert_eq!(body["partitionNames"][0], "p2024");
        assert_eq!(body["searchParams"]["metricType"], "COSINE");
    }

    #[test]
    fn test_parse_ids() {
        assert_eq!(parse_id(&json!(42)).unwrap(), 42);
        assert_eq!(parse_id(&json!("449865311226396672")).unwrap(), 449865311226396672);
        assert!(parse_id(&json!(null)).is_err());
    }

    #[test]
    fn test_error_envelope() {
        let env: Envelope<Value> =
            serde_json::from_str(r#"{"code": 1100, "message": "collection not found"}"#).unwrap();
        assert_eq!(env.code, 1100);
        assert!(env.data.is_none());
    }

    #[test]
    fn test_invalid_collection_name() {
        assert!(MilvusIndex::new(
            "http://localhost:19530",
            None,
            "bad-name",
            4,
            Metric::InnerProduct,
            Duration::from_secs(1),
        )
        .is_err());
    }
}
