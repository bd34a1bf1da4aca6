//! Embedding providers.
//!
//! Every provider maps an ordered batch of texts to an order-preserving,
//! equal-length batch of `D`-dimensional vectors, or fails as a whole.

pub mod provider;
pub mod providers;

pub use provider::{check_batch, create_provider, EmbeddingProvider};
