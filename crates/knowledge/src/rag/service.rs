//! The two service operations: Index and Chat.
//!
//! `RagService` owns one long-lived handle per collaborator and is shared
//! across requests behind an `Arc`. Every call runs as a single sequential
//! chain of external calls.

use crate::config::{EmptyContextPolicy, GenerationConfig, RetrievalConfig};
use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::indexer::{IndexReport, Indexer};
use crate::rag::generator::AnswerGenerator;
use crate::rag::stage::{ChatStage, StageTracker};
use crate::retriever::Retriever;
use crate::store::{FactStore, SqliteFactStore};
use crate::types::SearchHit;
use crate::vector::{create_index, VectorIndex};
use factrag_core::{AppConfig, AppError, AppResult};
use factrag_llm::{create_client, LlmClient};
use factrag_prompt::{load_or_default, PromptAssembler, PromptDefinition, DEFAULT_PROMPT_ID};
use futures::stream::BoxStream;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Result of one Chat call.
#[derive(Debug, Clone, Serialize)]
pub struct ChatAnswer {
    pub answer: String,

    /// Facts the answer was grounded on, best first
    pub facts: Vec<String>,

    #[serde(skip_serializing)]
    pub hits: Vec<SearchHit>,
}

impl ChatAnswer {
    /// Fixed answer used when nothing relevant was retrieved.
    pub fn no_information(query: &str) -> Self {
        Self {
            answer: format!(
                "I could not find information about \"{}\" in the indexed facts.",
                query.trim()
            ),
            facts: Vec::new(),
            hits: Vec::new(),
        }
    }
}

/// Counts and wiring details reported by `stats`.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub facts: u64,
    pub vectors: u64,
    pub backend: String,
    pub collection: String,
    pub embedding_provider: String,
    pub llm_provider: String,
}

pub struct RagService {
    indexer: Indexer,
    retriever: Retriever,
    assembler: PromptAssembler,
    generator: AnswerGenerator,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn FactStore>,
    index: Arc<dyn VectorIndex>,
}

impl RagService {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn FactStore>,
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn LlmClient>,
        prompt: PromptDefinition,
        retrieval: RetrievalConfig,
        generation: GenerationConfig,
    ) -> AppResult<Self> {
        if embedder.dimensions() != retrieval.dimensions {
            return Err(AppError::Config(format!(
                "Embedding provider produces {} dimensions, collection expects {}",
                embedder.dimensions(),
                retrieval.dimensions
            )));
        }

        Ok(Self {
            indexer: Indexer::new(embedder.clone(), store.clone(), index.clone()),
            retriever: Retriever::new(embedder.clone(), store.clone(), index.clone(), retrieval),
            assembler: PromptAssembler::new(prompt)?,
            generator: AnswerGenerator::new(llm, generation),
            embedder,
            store,
            index,
        })
    }

    /// Build every collaborator from configuration.
    ///
    /// Opens the fact store, initialises the vector collection and resolves
    /// the prompt definition, so a misconfigured backend fails here rather
    /// than on the first request.
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;
        config.ensure_factrag_dir()?;

        let embedding_key = config.resolve_api_key(&config.embedding.api_key_env);
        let embedder = create_provider(&config.embedding, embedding_key.as_deref())?;

        let store: Arc<dyn FactStore> = Arc::new(SqliteFactStore::open(&config.store_path())?);
        let index = create_index(config).await?;

        let llm_key = config.resolve_api_key(&config.llm.api_key_env);
        let llm = create_client(
            &config.llm.provider,
            config.llm.endpoint.as_deref(),
            llm_key.as_deref(),
            Duration::from_secs(config.llm.timeout_secs),
        )?;

        let prompt = load_or_default(&config.workspace, DEFAULT_PROMPT_ID)?;

        tracing::info!(
            embedding = embedder.provider_name(),
            llm = llm.provider_name(),
            backend = index.backend_name(),
            prompt = %prompt.id,
            "Service initialised"
        );

        Self::new(
            embedder,
            store,
            index,
            llm,
            prompt,
            RetrievalConfig::from_app_config(config)?,
            GenerationConfig::from_app_config(config),
        )
    }

    pub fn retrieval_config(&self) -> &RetrievalConfig {
        self.retriever.config()
    }

    /// Index a batch of texts; see [`Indexer::index`].
    pub async fn index(&self, texts: &[String]) -> AppResult<IndexReport> {
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(AppError::Validation(
                "facts: items cannot be blank".to_string(),
            ));
        }
        self.indexer.index(texts).await
    }

    /// Answer `query` from the indexed facts.
    ///
    /// The whole answer is generated before this returns; a provider failure
    /// means nothing was produced.
    pub async fn answer(&self, query: &str) -> AppResult<ChatAnswer> {
        if query.trim().is_empty() {
            return Err(AppError::Validation("query: cannot be blank".to_string()));
        }

        tracing::info!("Begin task Chat");
        let mut tracker = StageTracker::new();

        let retrieval = self.retriever.retrieve_tracked(query, &mut tracker).await?;

        if retrieval.is_empty()
            && self.retriever.config().empty_context == EmptyContextPolicy::NoInformation
        {
            tracker.complete();
            tracing::info!("End task Chat (no relevant facts)");
            return Ok(ChatAnswer::no_information(query));
        }

        tracker.advance(ChatStage::Prompting);
        let prompt = self
            .assembler
            .assemble(&retrieval.facts, query)
            .map_err(|e| tracker.fail(e))?;

        tracker.advance(ChatStage::Generating);
        let answer = self
            .generator
            .generate(&prompt, &self.assembler.definition().behavior)
            .await
            .map_err(|e| tracker.fail(e))?;

        tracker.complete();
        tracing::info!(facts = retrieval.facts.len(), "End task Chat");

        Ok(ChatAnswer {
            answer,
            facts: retrieval.facts,
            hits: retrieval.hits,
        })
    }

    /// Paced token stream of a finished answer.
    pub fn paced(&self, answer: &ChatAnswer) -> BoxStream<'static, String> {
        self.generator.pace(&answer.answer)
    }

    pub async fn stats(&self) -> AppResult<ServiceStats> {
        Ok(ServiceStats {
            facts: self.store.count().await?,
            vectors: self.index.count().await?,
            backend: self.index.backend_name().to_string(),
            collection: self.retriever.config().collection.clone(),
            embedding_provider: self.embedder.provider_name().to_string(),
            llm_provider: self.generator.provider_name().to_string(),
        })
    }
}
