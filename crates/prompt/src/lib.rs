//! Prompt assembly for factrag.
//!
//! Turns an ordered fact list and a user query into the single instruction
//! string sent to the language model:
//! - YAML-based prompt definitions (`.factrag/prompts/<id>.yml`)
//! - A built-in grounded-answer definition used when no override exists
//! - Handlebars rendering with escaping disabled

pub mod assembler;
pub mod loader;
pub mod types;

// Re-export main types
pub use assembler::{assemble, number_facts, PromptAssembler};
pub use loader::{load_or_default, load_prompt};
pub use types::{PromptBehavior, PromptDefinition, DEFAULT_PROMPT_ID};
