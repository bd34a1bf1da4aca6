//! OpenAI-compatible chat completion provider.
//!
//! Works against api.openai.com and any server exposing the same
//! `/chat/completions` surface.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use factrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = factrag_core::config::DEFAULT_OPENAI_LLM_MODEL;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// OpenAI-compatible completion client.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a client for the given endpoint and API key.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Provider(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    fn to_chat_request<'a>(&self, request: &'a LlmRequest) -> ChatRequest<'a> {
        let messages = vec![ChatMessage {
            role: "user",
            content: &request.prompt,
        }];

        ChatRequest {
            model: &request.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

fn into_response(parsed: ChatResponse, requested_model: &str) -> AppResult<LlmResponse> {
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AppError::Provider("Completion response has no choices".to_string()))?;

    let usage = parsed
        .usage
        .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
        .unwrap_or_default();

    let model = if parsed.model.is_empty() {
        requested_model.to_string()
    } else {
        parsed.model
    };

    Ok(LlmResponse {
        content,
        model,
        usage,
    })
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(model = %request.model, "Sending chat completion request");

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.to_chat_request(request))
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to send completion request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Provider(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to parse completion response: {}", e)))?;

        into_response(parsed, &request.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiClient {
        OpenAiClient::new(DEFAULT_OPENAI_URL, "sk-test", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_prompt_is_single_user_message() {
        let request = LlmRequest::new("What is the capital of France?", DEFAULT_OPENAI_MODEL);
        let client = client();
        let body = serde_json::to_value(client.to_chat_request(&request)).unwrap();

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "What is the capital of France?");
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_parse_response() {
        let raw = r#"{
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Paris."}}],
            "usage": {"prompt_tokens": 40, "completion_tokens": 2, "total_tokens": 42}
        }"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        let response = into_response(parsed, DEFAULT_OPENAI_MODEL).unwrap();
        assert_eq!(response.content, "Paris.");
        assert_eq!(response.usage.total_tokens, 42);
    }

    #[test]
    fn test_empty_choices_is_provider_error() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let err = into_response(parsed, DEFAULT_OPENAI_MODEL).unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));
    }
}
