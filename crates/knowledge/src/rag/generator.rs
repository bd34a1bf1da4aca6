//! Answer generation and paced delivery.

use crate::config::GenerationConfig;
use factrag_core::{AppError, AppResult};
use factrag_llm::{LlmClient, LlmRequest};
use factrag_prompt::PromptBehavior;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Duration;

pub struct AnswerGenerator {
    client: Arc<dyn LlmClient>,
    config: GenerationConfig,
}

impl AnswerGenerator {
    pub fn new(client: Arc<dyn LlmClient>, config: GenerationConfig) -> Self {
        Self { client, config }
    }

    pub fn provider_name(&self) -> &str {
        self.client.provider_name()
    }

    /// Send `prompt` as one user message and return the finished answer.
    pub async fn generate(&self, prompt: &str, behavior: &PromptBehavior) -> AppResult<String> {
        let mut request = LlmRequest::new(prompt, &self.config.model);
        if let Some(temperature) = behavior.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = behavior.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let response = self.client.complete(&request).await.map_err(|e| {
            tracing::error!(operation = "Complete", error = %e, "Generation failed");
            e
        })?;

        if response.content.trim().is_empty() {
            let e = AppError::Provider(format!(
                "{} returned an empty answer",
                self.client.provider_name()
            ));
            tracing::error!(operation = "Complete", error = %e, "Generation failed");
            return Err(e);
        }

        tracing::debug!(
            model = %response.model,
            completion_tokens = response.usage.completion_tokens,
            "Answer generated"
        );

        Ok(response.content)
    }

    /// Paced stream of `answer`'s whitespace tokens using the configured delay.
    pub fn pace(&self, answer: &str) -> BoxStream<'static, String> {
        pace(answer, self.config.token_delay)
    }
}

/// Split an answer into the tokens a paced stream emits.
pub fn tokens(answer: &str) -> Vec<String> {
    answer.split_whitespace().map(str::to_string).collect()
}

/// Emit `answer`'s tokens one at a time, `delay` apart.
pub fn pace(answer: &str, delay: Duration) -> BoxStream<'static, String> {
    let state = (tokens(answer).into_iter(), true);

    stream::unfold(state, move |(mut remaining, first)| async move {
        let token = remaining.next()?;
        if !first && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Some((token, (remaining, false)))
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use factrag_llm::{LlmResponse, LlmUsage};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        answer: String,
        seen: Mutex<Vec<LlmRequest>>,
    }

    #[async_trait::async_trait]
    impl LlmClient for RecordingClient {
        fn provider_name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(LlmResponse {
                content: self.answer.clone(),
                model: request.model.clone(),
                usage: LlmUsage::new(10, 3),
            })
        }
    }

    fn config() -> GenerationConfig {
        GenerationConfig {
            model: "llama3.2".to_string(),
            token_delay: Duration::from_millis(0),
        }
    }

    #[tokio::test]
    async fn test_generate_forwards_behavior() {
        let client = Arc::new(RecordingClient {
            answer: "Paris.".to_string(),
            ..Default::default()
        });
        let generator = AnswerGenerator::new(client.clone(), config());

        let behavior = PromptBehavior {
            temperature: Some(0.1),
            max_tokens: Some(128),
        };
        let answer = generator.generate("prompt", &behavior).await.unwrap();
        assert_eq!(answer, "Paris.");

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].prompt, "prompt");
        assert_eq!(seen[0].model, "llama3.2");
        assert_eq!(seen[0].temperature, Some(0.1));
        assert_eq!(seen[0].max_tokens, Some(128));
    }

    #[tokio::test]
    async fn test_blank_answer_is_provider_error() {
        let client = Arc::new(RecordingClient {
            answer: "  \n".to_string(),
            ..Default::default()
        });
        let generator = AnswerGenerator::new(client, config());
        let err = generator
            .generate("prompt", &PromptBehavior::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));
    }

    #[tokio::test]
    async fn test_paced_tokens_match_whitespace_split() {
        let answer = "The capital of\tFrance is\n\n Paris.";
        let streamed: Vec<String> = pace(answer, Duration::from_millis(1)).collect().await;
        assert_eq!(streamed, tokens(answer));
        assert_eq!(streamed, vec!["The", "capital", "of", "France", "is", "Paris."]);
    }

    #[tokio::test]
    async fn test_pacing_waits_between_tokens() {
        let started = std::time::Instant::now();
        let streamed: Vec<String> = pace("a b c", Duration::from_millis(20)).collect().await;
        assert_eq!(streamed.len(), 3);
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_empty_answer_streams_nothing() {
        let streamed: Vec<String> = pace("   ", Duration::from_millis(1)).collect().await;
        assert!(streamed.is_empty());
    }
}
