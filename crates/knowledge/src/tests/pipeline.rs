//! Index and Chat behaviour against in-memory collaborators.

use super::fakes::{axis, normalize, FixedEmbedder, FixedLlm, MemoryIndex, MemoryStore};
use crate::config::{EmptyContextPolicy, GenerationConfig, RetrievalConfig};
use crate::embeddings::providers::MockProvider;
use crate::indexer::ItemOutcome;
use crate::rag::{tokens, RagService};
use crate::store::{FactStore, SqliteFactStore};
use crate::vector::{SqliteVectorIndex, VectorIndex};
use factrag_core::AppError;
use factrag_prompt::{assemble, PromptDefinition};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

const PARIS: &str = "Paris is the capital of France";
const ROME: &str = "Rome is the capital of Italy";
const BANANAS: &str = "Bananas grow in tropical climates";
const QUESTION: &str = "What is the capital of France?";

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn retrieval(threshold: f32, policy: EmptyContextPolicy) -> RetrievalConfig {
    RetrievalConfig {
        dimensions: 4,
        score_threshold: threshold,
        empty_context: policy,
        ..Default::default()
    }
}

fn generation() -> GenerationConfig {
    GenerationConfig {
        model: "test-model".to_string(),
        token_delay: Duration::from_millis(0),
    }
}

/// Paris scores 1.0 against the question, Rome 0.8, Bananas 0.0.
fn geography() -> FixedEmbedder {
    FixedEmbedder::new(4)
        .with(PARIS, axis(4, 0))
        .with(ROME, normalize(&[0.8, 0.6, 0.0, 0.0]))
        .with(BANANAS, axis(4, 2))
        .with(QUESTION, axis(4, 0))
}

struct Harness {
    embedder: Arc<FixedEmbedder>,
    store: Arc<MemoryStore>,
    index: Arc<MemoryIndex>,
    llm: Arc<FixedLlm>,
}

impl Harness {
    fn new(embedder: FixedEmbedder, store: MemoryStore, index: MemoryIndex, llm: FixedLlm) -> Self {
        Self {
            embedder: Arc::new(embedder),
            store: Arc::new(store),
            index: Arc::new(index),
            llm: Arc::new(llm),
        }
    }

    fn healthy() -> Self {
        Self::new(
            geography(),
            MemoryStore::default(),
            MemoryIndex::default(),
            FixedLlm::answering("Paris is the capital of France."),
        )
    }

    fn service(&self, config: RetrievalConfig) -> RagService {
        RagService::new(
            self.embedder.clone(),
            self.store.clone(),
            self.index.clone(),
            self.llm.clone(),
            PromptDefinition::builtin_default(),
            config,
            generation(),
        )
        .unwrap()
    }
}

#[tokio::test]
async fn test_indexed_ids_match_across_stores() {
    let harness = Harness::healthy();
    let service = harness.service(retrieval(0.3, EmptyContextPolicy::Proceed));

    let report = service.index(&texts(&[PARIS, ROME, BANANAS])).await.unwrap();

    assert_eq!(report.indexed(), 3);
    assert_eq!(harness.embedder.calls(), 1);
    assert_eq!(harness.store.ids(), vec![1, 2, 3]);
    assert_eq!(harness.index.ids(), harness.store.ids());
    assert_eq!(report.indexed_ids(), harness.store.ids());
}

#[tokio::test]
async fn test_store_failure_does_not_stop_later_items() {
    let harness = Harness::new(
        geography(),
        MemoryStore::failing_on(&[1]),
        MemoryIndex::default(),
        FixedLlm::answering("unused"),
    );
    let service = harness.service(retrieval(0.3, EmptyContextPolicy::Proceed));

    let report = service.index(&texts(&[PARIS, ROME, BANANAS])).await.unwrap();

    assert_eq!(harness.store.create_attempts(), 3);
    assert!(matches!(report.outcomes[0], ItemOutcome::Indexed { id: 1 }));
    assert!(matches!(report.outcomes[1], ItemOutcome::StoreFailed { .. }));
    assert!(matches!(report.outcomes[2], ItemOutcome::Indexed { id: 2 }));
    assert_eq!(harness.index.ids(), vec![1, 2]);
}

#[tokio::test]
async fn test_vector_failure_leaves_fact_record() {
    let harness = Harness::new(
        geography(),
        MemoryStore::default(),
        MemoryIndex::failing_for(&[2]),
        FixedLlm::answering("unused"),
    );
    let service = harness.service(retrieval(0.3, EmptyContextPolicy::Proceed));

    let report = service.index(&texts(&[PARIS, ROME, BANANAS])).await.unwrap();

    assert_eq!(harness.store.ids(), vec![1, 2, 3]);
    assert_eq!(harness.index.ids(), vec![1, 3]);
    assert_eq!(report.failed(), 1);
    assert!(matches!(
        report.outcomes[1],
        ItemOutcome::VectorInsertFailed { id: 2, .. }
    ));
}

#[tokio::test]
async fn test_embedding_failure_writes_nothing() {
    let harness = Harness::new(
        geography().failing(),
        MemoryStore::default(),
        MemoryIndex::default(),
        FixedLlm::answering("unused"),
    );
    let service = harness.service(retrieval(0.3, EmptyContextPolicy::Proceed));

    let err = service.index(&texts(&[PARIS, ROME])).await.unwrap_err();

    assert!(matches!(err, AppError::Provider(_)));
    assert_eq!(harness.store.create_attempts(), 0);
    assert!(harness.index.ids().is_empty());
}

#[tokio::test]
async fn test_blank_input_is_rejected() {
    let harness = Harness::healthy();
    let service = harness.service(retrieval(0.3, EmptyContextPolicy::Proceed));

    let err = service.index(&[]).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = service.index(&texts(&[PARIS, "   "])).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = service.answer(" \n").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert_eq!(harness.embedder.calls(), 0);
}

#[tokio::test]
async fn test_facts_follow_search_order() {
    let harness = Harness::healthy();
    let service = harness.service(retrieval(0.3, EmptyContextPolicy::Proceed));
    service.index(&texts(&[PARIS, ROME, BANANAS])).await.unwrap();

    // Lookups come back as [2, 1]; search ranked them [1, 2]
    let answer = service.answer(QUESTION).await.unwrap();

    assert_eq!(answer.facts, vec![PARIS, ROME]);
    assert!(answer.hits[0].score > answer.hits[1].score);
}

#[tokio::test]
async fn test_below_threshold_facts_are_absent() {
    let harness = Harness::healthy();
    let service = harness.service(retrieval(0.85, EmptyContextPolicy::Proceed));
    service.index(&texts(&[PARIS, ROME, BANANAS])).await.unwrap();

    let answer = service.answer(QUESTION).await.unwrap();

    assert_eq!(answer.facts, vec![PARIS]);
    assert!(answer.hits.iter().all(|h| h.score >= 0.85));

    let prompt = &harness.llm.prompts()[0];
    assert!(!prompt.contains(ROME));
    assert!(!prompt.contains(BANANAS));
}

#[tokio::test]
async fn test_empty_search_is_no_data() {
    let harness = Harness::healthy();
    let service = harness.service(retrieval(0.3, EmptyContextPolicy::Proceed));

    let err = service.answer(QUESTION).await.unwrap_err();

    assert!(matches!(err, AppError::NoData(_)));
    assert_eq!(harness.index.searches(), 1);
    assert!(harness.llm.prompts().is_empty());
}

#[tokio::test]
async fn test_lookup_failure_is_fatal() {
    let harness = Harness::new(
        geography(),
        MemoryStore::failing_lookups(),
        MemoryIndex::default(),
        FixedLlm::answering("unused"),
    );
    let service = harness.service(retrieval(0.3, EmptyContextPolicy::Proceed));
    service.index(&texts(&[PARIS])).await.unwrap();

    let err = service.answer(QUESTION).await.unwrap_err();
    assert!(matches!(err, AppError::Persistence(_)));
    assert!(harness.llm.prompts().is_empty());
}

#[tokio::test]
async fn test_query_embedding_failure_is_fatal() {
    let harness = Harness::new(
        geography().failing(),
        MemoryStore::default(),
        MemoryIndex::default(),
        FixedLlm::answering("unused"),
    );
    let service = harness.service(retrieval(0.3, EmptyContextPolicy::Proceed));

    let err = service.answer(QUESTION).await.unwrap_err();

    assert!(matches!(err, AppError::Provider(_)));
    assert_eq!(harness.embedder.calls(), 1);
    assert_eq!(harness.index.searches(), 0);
    assert!(harness.llm.prompts().is_empty());
}

#[tokio::test]
async fn test_empty_query_vector_is_fatal() {
    let harness = Harness::new(
        geography().with(QUESTION, Vec::new()),
        MemoryStore::default(),
        MemoryIndex::default(),
        FixedLlm::answering("unused"),
    );
    let service = harness.service(retrieval(0.3, EmptyContextPolicy::Proceed));
    service.index(&texts(&[PARIS])).await.unwrap();

    let err = service.answer(QUESTION).await.unwrap_err();

    assert!(matches!(err, AppError::Provider(ref msg) if msg.contains("came back empty")));
    assert_eq!(harness.index.searches(), 0);
    assert!(harness.llm.prompts().is_empty());
}

#[tokio::test]
async fn test_missing_query_vector_is_fatal() {
    let harness = Harness::new(
        geography().returning_nothing(),
        MemoryStore::default(),
        MemoryIndex::default(),
        FixedLlm::answering("unused"),
    );
    let service = harness.service(retrieval(0.3, EmptyContextPolicy::Proceed));

    let err = service.answer(QUESTION).await.unwrap_err();

    assert!(matches!(err, AppError::Provider(_)));
    assert_eq!(harness.index.searches(), 0);
    assert!(harness.llm.prompts().is_empty());
}

#[tokio::test]
async fn test_no_information_policy_skips_model() {
    let harness = Harness::healthy();
    let service = harness.service(retrieval(0.99, EmptyContextPolicy::NoInformation));
    service.index(&texts(&[ROME, BANANAS])).await.unwrap();

    let answer = service.answer(QUESTION).await.unwrap();

    assert!(answer.facts.is_empty());
    assert!(answer.answer.contains("could not find information"));
    assert!(answer.answer.contains(QUESTION));
    assert!(harness.llm.prompts().is_empty());
}

#[tokio::test]
async fn test_proceed_policy_prompts_with_no_facts() {
    let harness = Harness::healthy();
    let service = harness.service(retrieval(0.99, EmptyContextPolicy::Proceed));
    service.index(&texts(&[ROME, BANANAS])).await.unwrap();

    let answer = service.answer(QUESTION).await.unwrap();

    assert!(answer.facts.is_empty());
    let prompts = harness.llm.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(!prompts[0].contains("1. "));
    assert!(prompts[0].ends_with(QUESTION));
}

#[tokio::test]
async fn test_generation_failure_surfaces() {
    let harness = Harness::new(
        geography(),
        MemoryStore::default(),
        MemoryIndex::default(),
        FixedLlm::failing(),
    );
    let service = harness.service(retrieval(0.3, EmptyContextPolicy::Proceed));
    service.index(&texts(&[PARIS])).await.unwrap();

    let err = service.answer(QUESTION).await.unwrap_err();
    assert!(matches!(err, AppError::Provider(_)));
    assert_eq!(harness.llm.prompts().len(), 1);
}

#[tokio::test]
async fn test_paced_tokens_equal_buffered_split() {
    let harness = Harness::new(
        geography(),
        MemoryStore::default(),
        MemoryIndex::default(),
        FixedLlm::answering("The capital\nof France  is Paris."),
    );
    let service = harness.service(retrieval(0.3, EmptyContextPolicy::Proceed));
    service.index(&texts(&[PARIS])).await.unwrap();

    let answer = service.answer(QUESTION).await.unwrap();
    let streamed: Vec<String> = service.paced(&answer).collect().await;

    assert_eq!(streamed, tokens(&answer.answer));
    assert_eq!(streamed.join(" "), "The capital of France is Paris.");
}

#[test]
fn test_prompt_assembly_is_deterministic() {
    let definition = PromptDefinition::builtin_default();
    let facts = texts(&[PARIS, ROME]);

    let first = assemble(&definition, &facts, QUESTION).unwrap();
    let second = assemble(&definition, &facts, QUESTION).unwrap();

    assert_eq!(first, second);
    assert!(first.contains("1. Paris is the capital of France\n2. Rome is the capital of Italy"));
}

#[tokio::test]
async fn test_stats_report_both_stores() {
    let harness = Harness::new(
        geography(),
        MemoryStore::default(),
        MemoryIndex::failing_for(&[3]),
        FixedLlm::answering("unused"),
    );
    let service = harness.service(retrieval(0.3, EmptyContextPolicy::Proceed));
    service.index(&texts(&[PARIS, ROME, BANANAS])).await.unwrap();

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.facts, 3);
    assert_eq!(stats.vectors, 2);
    assert_eq!(stats.backend, "memory");
    assert_eq!(stats.collection, "facts");
}

#[test]
fn test_dimension_mismatch_rejected_at_construction() {
    let result = RagService::new(
        Arc::new(FixedEmbedder::new(8)),
        Arc::new(MemoryStore::default()),
        Arc::new(MemoryIndex::default()),
        Arc::new(FixedLlm::answering("unused")),
        PromptDefinition::builtin_default(),
        retrieval(0.3, EmptyContextPolicy::Proceed),
        generation(),
    );
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[tokio::test]
async fn test_paris_example_end_to_end() {
    let dims = 256;
    let store = Arc::new(SqliteFactStore::open_in_memory().unwrap());
    let index = Arc::new(SqliteVectorIndex::open_in_memory("facts", dims).unwrap());
    index.init_collection().await.unwrap();
    let llm = Arc::new(FixedLlm::answering("Paris."));

    let service = RagService::new(
        Arc::new(MockProvider::new(dims)),
        store.clone(),
        index.clone(),
        llm.clone(),
        PromptDefinition::builtin_default(),
        RetrievalConfig {
            dimensions: dims,
            ..Default::default()
        },
        generation(),
    )
    .unwrap();

    let report = service.index(&texts(&[PARIS])).await.unwrap();
    let ids = report.indexed_ids();
    assert_eq!(ids.len(), 1);
    assert_eq!(store.count().await.unwrap(), 1);
    assert_eq!(index.count().await.unwrap(), 1);
    assert_eq!(store.get_facts(&ids).await.unwrap()[0].text, PARIS);

    service.index(&texts(&[BANANAS])).await.unwrap();

    let answer = service.answer(QUESTION).await.unwrap();
    assert_eq!(answer.facts, vec![PARIS]);
    assert_eq!(answer.hits[0].id, ids[0]);
    assert_eq!(answer.answer, "Paris.");

    let prompt = &llm.prompts()[0];
    let fact_at = prompt.find("1. Paris is the capital of France").unwrap();
    let query_at = prompt.rfind(QUESTION).unwrap();
    assert!(fact_at < query_at);
    assert!(prompt.ends_with(QUESTION));
}
