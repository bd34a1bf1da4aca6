//! LLM integration crate for factrag.
//!
//! A provider-agnostic completion interface used by the answer generator.
//! The pipeline always asks for one finished answer; pacing the answer out
//! token by token is done above this crate.
//!
//! # Providers
//! - **Ollama**: local runtime, `/api/generate` (default)
//! - **OpenAI**: any OpenAI-compatible `/chat/completions` endpoint
//!
//! # Example
//! ```no_run
//! use factrag_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiClient};
pub use types::ProviderType;
