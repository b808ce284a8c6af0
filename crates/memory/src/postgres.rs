//! PostgreSQL document backend.
//!
//! Stores the memory bank as one row keyed by a fixed string, with the
//! document in a `JSONB` column:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS memory_bank (
//!     key        TEXT PRIMARY KEY,
//!     value      JSONB NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! # Feature gate
//!
//! This module is behind the `postgres` feature flag:
//!
//! ```toml
//! mnemo-memory = { workspace = true, features = ["postgres"] }
//! ```

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

use mnemo_core::error::MemoryError;
use mnemo_core::memory::DocumentBackend;

/// Remote row-store backend. Reads through [`crate::MemoryStore`] fail safe.
pub struct PostgresBackend {
    pool: PgPool,
    table: String,
}

impl PostgresBackend {
    /// Connect and make sure the table exists.
    pub async fn connect(database_url: &str, table: &str) -> Result<Self, MemoryError> {
        let table = validate_table_name(table)?;
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await
            .map_err(|e| MemoryError::Remote(format!("PostgreSQL connection failed: {e}")))?;

        info!(table = %table, "Connected to PostgreSQL for memory backend");
        let backend = Self { pool, table };
        backend.migrate().await?;
        Ok(backend)
    }

    /// Create from an existing connection pool.
    pub fn from_pool(pool: PgPool, table: &str) -> Result<Self, MemoryError> {
        Ok(Self {
            pool,
            table: validate_table_name(table)?,
        })
    }

    /// Create the document table if it does not exist.
    pub async fn migrate(&self) -> Result<(), MemoryError> {
        sqlx::raw_sql(&create_table_sql(&self.table))
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::MigrationFailed(format!("Migration failed: {e}")))?;
        info!(table = %self.table, "Memory table ready");
        Ok(())
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
fn validate_table_name(table: &str) -> Result<String, MemoryError> {
    let valid = !table.is_empty()
        && table.len() <= 63
        && table
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(table.to_string())
    } else {
        Err(MemoryError::Storage(format!(
            "invalid table name: {table:?}"
        )))
    }
}

fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\
         key TEXT PRIMARY KEY, \
         value JSONB NOT NULL, \
         updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW())"
    )
}

fn select_sql(table: &str) -> String {
    format!("SELECT value::text AS value FROM {table} WHERE key = $1")
}

fn upsert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {table} (key, value, updated_at) VALUES ($1, $2::jsonb, NOW()) \
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()"
    )
}

#[async_trait]
impl DocumentBackend for PostgresBackend {
    fn name(&self) -> &str {
        "postgres"
    }

    fn is_remote(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> Result<Option<String>, MemoryError> {
        let row = sqlx::query(&select_sql(&self.table))
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MemoryError::Remote(format!("Failed to fetch memory: {e}")))?;

        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    async fn put(&self, key: &str, document: &str) -> Result<(), MemoryError> {
        sqlx::query(&upsert_sql(&self.table))
            .bind(key)
            .bind(document)
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Remote(format!("Failed to upsert memory: {e}")))?;

        debug!(key = %key, bytes = document.len(), "Upserted memory document");
        Ok(())
    }
}

// ── Unit tests (no DB required) ──────────────────────────────────────────
