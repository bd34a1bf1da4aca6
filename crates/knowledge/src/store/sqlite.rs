//! SQLite-backed fact store.

use super::FactStore;
use crate::types::{vector_to_bytes, NewFact, StoredFact};
use chrono::{DateTime, Utc};
use factrag_core::{AppError, AppResult};
use rusqlite::{params, params_from_iter, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS facts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        text TEXT NOT NULL,
        vector BLOB NOT NULL,
        is_visible INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    );
"#;

/// Fact store over a single SQLite connection.
///
/// The connection is serialised behind a mutex; callers share the store
/// through an `Arc`.
pub struct SqliteFactStore {
    conn: Mutex<Connection>,
}

impl SqliteFactStore {
    /// Open (or create) the database at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Persistence(format!("Failed to create store directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Persistence(format!("Failed to open fact store: {}", e)))?;

        tracing::debug!("Opened fact store at {:?}", db_path);
        Self::with_connection(conn)
    }

    /// In-memory store, gone when dropped.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Persistence(format!("Failed to open fact store: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| AppError::Persistence(format!("Failed to create tables: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Persistence("Fact store lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl FactStore for SqliteFactStore {
    async fn create(&self, fact: &NewFact) -> AppResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO facts (text, vector, is_visible, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                fact.text,
                vector_to_bytes(&fact.vector),
                fact.visible,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| AppError::Persistence(format!("Failed to insert fact: {}", e)))?;

        Ok(conn.last_insert_rowid())
    }

    async fn get_facts(&self, ids: &[i64]) -> AppResult<Vec<StoredFact>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, text, created_at FROM facts WHERE is_visible = 1 AND id IN ({})",
            placeholders
        );

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AppError::Persistence(format!("Failed to prepare lookup: {}", e)))?;

        let rows = stmt
            .query_map(params_from_iter(ids.iter()), |row| {
                let created_at: String = row.get(2)?;
                Ok(StoredFact {
                    id: row.get(0)?,
                    text: row.get(1)?,
                    created_at: DateTime::parse_from_rfc3339(&created_at)
                        .ok()
                        .map(|t| t.with_timezone(&Utc)),
                })
            })
            .map_err(|e| AppError::Persistence(format!("Failed to query facts: {}", e)))?;

        let facts = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Persistence(format!("Failed to read fact row: {}", e)))?;

        Ok(facts)
    }

    async fn count(&self) -> AppResult<u64> {
        let conn = self.lock()?;
        conn.query_row("SELECT COUNT(*) FROM facts", [], |row| row.get::<_, i64>(0))
            .map(|n| n as u64)
            .map_err(|e| AppError::Persistence(format!("Failed to count facts: {}", e)))
    }
}
