//! Shared types for the indexing and retrieval pipeline.

use chrono::{DateTime, Utc};
use factrag_core::config::canonical_metric;
use factrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// A fact about to be persisted; the store assigns its ID.
#[derive(Debug, Clone)]
pub struct NewFact {
    pub text: String,
    pub vector: Vec<f32>,
    pub visible: bool,
}

/// A persisted fact as returned by a lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFact {
    pub id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// One vector index row. `id` is always the ID of an existing fact.
#[derive(Debug, Clone)]
pub struct VectorEntry {
    pub id: i64,
    pub vector: Vec<f32>,
    pub visible: bool,
}

/// A ranked search candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: i64,
    pub score: f32,
}

/// Similarity metric. Higher scores are always more similar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    InnerProduct,
    Cosine,
}

impl Metric {
    pub fn parse(s: &str) -> AppResult<Self> {
        match canonical_metric(s) {
            Some("ip") => Ok(Self::InnerProduct),
            Some("cosine") => Ok(Self::Cosine),
            _ => Err(AppError::Config(format!("Unknown metric: {}", s.trim()))),
        }
    }

    /// Metric name as Milvus spells it.
    pub fn milvus_name(&self) -> &'static str {
        match self {
            Self::InnerProduct => "IP",
            Self::Cosine => "COSINE",
        }
    }

    /// Score two equal-length vectors.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::InnerProduct => dot(a, b),
            Self::Cosine => cosine_similarity(a, b),
        }
    }
}

/// Parameters for one nearest-neighbour query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub top_k: usize,
    pub metric: Metric,
    /// Backend filter expression, e.g. `is_visible == true`
    pub filter: Option<String>,
    /// Partition restriction; empty searches every partition
    pub partitions: Vec<String>,
}

impl SearchParams {
    pub fn new(top_k: usize, metric: Metric) -> Self {
        Self {
            top_k,
            metric,
            filter: None,
            partitions: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product = dot(a, b);
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Encode a vector as little-endian `f32` bytes.
pub fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode little-endian `f32` bytes back into a vector.
pub fn bytes_to_vector(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Serialization(format!(
            "Invalid vector blob length: {}",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_parse() {
        assert_eq!(Metric::parse("ip").unwrap(), Metric::InnerProduct);
        assert_eq!(Metric::parse("inner_product").unwrap(), Metric::InnerProduct);
        assert_eq!(Metric::parse("COSINE").unwrap(), Metric::Cosine);
        assert!(Metric::parse("l2").is_err());
    }

    #[test]
    fn test_inner_product_vs_cosine() {
        let a = [2.0, 0.0];
        let b = [3.0, 0.0];
        assert!((Metric::InnerProduct.score(&a, &b) - 6.0).abs() < 1e-6);
        assert!((Metric::Cosine.score(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_vector_bytes() {
        let v = vec![0.25f32, -1.5, 3.0];
        let bytes = vector_to_bytes(&v);
        assert_eq!(bytes.len(), 12);
        assert_eq!(bytes_to_vector(&bytes).unwrap(), v);
        assert!(bytes_to_vector(&bytes[..5]).is_err());
    }
}
