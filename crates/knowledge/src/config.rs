//! Pipeline configuration handed to the indexer, retriever and service.

use crate::types::Metric;
use factrag_core::{AppConfig, AppError, AppResult};
use std::time::Duration;

/// What the chat flow does when every candidate falls below the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyContextPolicy {
    /// Prompt the model with zero facts; the framing makes it say so.
    #[default]
    Proceed,
    /// Skip the model and answer with a fixed "no information" message.
    NoInformation,
}

impl EmptyContextPolicy {
    pub fn parse(s: &str) -> AppResult<Self> {
        match s.trim() {
            "proceed" => Ok(Self::Proceed),
            "no_information" => Ok(Self::NoInformation),
            other => Err(AppError::Config(format!(
                "Unknown emptyContext policy: {}",
                other
            ))),
        }
    }
}

/// Retrieval and indexing parameters, read once at startup.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub collection: String,
    pub dimensions: usize,
    pub top_k: usize,
    pub score_threshold: f32,
    pub metric: Metric,
    pub filter: Option<String>,
    pub empty_context: EmptyContextPolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            collection: "facts".to_string(),
            dimensions: 768,
            top_k: 5,
            score_threshold: 0.3,
            metric: Metric::InnerProduct,
            filter: None,
            empty_context: EmptyContextPolicy::Proceed,
        }
    }
}

impl RetrievalConfig {
    pub fn from_app_config(config: &AppConfig) -> AppResult<Self> {
        Ok(Self {
            collection: config.vector.collection.clone(),
            dimensions: config.embedding.effective_dimensions(),
            top_k: config.retrieval.top_k,
            score_threshold: config.retrieval.score_threshold,
            metric: Metric::parse(&config.vector.metric)?,
            filter: None,
            empty_context: EmptyContextPolicy::parse(&config.retrieval.empty_context)?,
        })
    }
}

/// Answer delivery settings.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub model: String,
    pub token_delay: Duration,
}

impl GenerationConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            model: config.llm.effective_model().to_string(),
            token_delay: Duration::from_millis(config.streaming.token_delay_ms),
        }
    }
}
