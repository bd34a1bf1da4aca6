//! Command handlers for the factrag CLI.

pub mod chat;
pub mod index;
pub mod serve;
pub mod stats;

// Re-export command types for convenience
pub use chat::ChatCommand;
pub use index::IndexCommand;
pub use serve::ServeCommand;
pub use stats::StatsCommand;
