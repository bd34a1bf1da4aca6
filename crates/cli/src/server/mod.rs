//! HTTP service exposing Index and Chat.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::router;
pub use state::AppState;
