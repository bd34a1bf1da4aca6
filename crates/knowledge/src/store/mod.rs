//! Correlation store: integer fact ID -> original text.

pub mod sqlite;

pub use sqlite::SqliteFactStore;

use crate::types::{NewFact, StoredFact};
use factrag_core::AppResult;

/// Persistent fact records.
///
/// IDs are assigned by the store on `create` and are the sole key shared
/// with the vector index.
#[async_trait::async_trait]
pub trait FactStore: Send + Sync {
    /// Persist a fact and return its newly assigned ID.
    async fn create(&self, fact: &NewFact) -> AppResult<i64>;

    /// Look up visible facts by ID.
    ///
    /// Result order is unspecified; unknown IDs are simply absent.
    async fn get_facts(&self, ids: &[i64]) -> AppResult<Vec<StoredFact>>;

    /// Number of stored facts.
    async fn count(&self) -> AppResult<u64>;
}
