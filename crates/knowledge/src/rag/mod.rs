//! Retrieval-augmented answering.
//!
//! Retrieve facts, assemble the grounded prompt, generate, optionally pace.

pub mod generator;
pub mod service;
pub mod stage;

pub use generator::{pace, tokens, AnswerGenerator};
pub use service::{ChatAnswer, RagService, ServiceStats};
pub use stage::{ChatStage, StageTracker};
