//! Memory store: load/save of the bank against a document backend.
//!
//! Reads and writes fail differently. A remote read that errors (or returns
//! a document that no longer validates) degrades to an empty bank rather than
//! serving possibly-corrupt state. That fallback is only for serving prompts:
//! a read-modify-write cycle uses [`MemoryStore::load_for_update`], which
//! surfaces every read failure so an unreadable bank is never overwritten.
//! A write that errors always surfaces to the caller.

use std::sync::Arc;

use mnemo_core::error::MemoryError;
use mnemo_core::memory::{DocumentBackend, MemoryBank};
use tracing::{debug, warn};

/// Default key of the single bank document.
pub const DEFAULT_DOCUMENT_KEY: &str = "memory";

/// Exclusive owner of the persisted [`MemoryBank`].
#[derive(Clone)]
pub struct MemoryStore {
    backend: Arc<dyn DocumentBackend>,
    key: String,
}

impl MemoryStore {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self::with_key(backend, DEFAULT_DOCUMENT_KEY)
    }

    pub fn with_key(backend: Arc<dyn DocumentBackend>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Load the current bank.
    ///
    /// Remote backend: any fetch or validation failure is logged and yields an
    /// empty bank. Local backend: a missing document yields an empty bank, an
    /// unreadable or invalid one is an error.
    pub async fn load(&self) -> Result<MemoryBank, MemoryError> {
        if !self.backend.is_remote() {
            return self.load_for_update().await;
        }

        Ok(self.load_for_update().await.unwrap_or_else(|e| {
            warn!(
                backend = %self.backend.name(),
                error = %e,
                "Remote memory read failed, starting from an empty bank"
            );
            MemoryBank::default()
        }))
    }

    /// Load the bank that a following [`save`](Self::save) will replace.
    ///
    /// Unlike [`load`](Self::load) this never degrades: a failed or invalid
    /// read is returned as an error on every backend. A missing document is
    /// still an empty bank.
    pub async fn load_for_update(&self) -> Result<MemoryBank, MemoryError> {
        match self.backend.get(&self.key).await? {
            Some(doc) => {
                let bank = MemoryBank::from_json(&doc)?;
                debug!(users = bank.users.len(), "Loaded memory bank");
                Ok(bank)
            }
            None => {
                debug!(backend = %self.backend.name(), "No memory document yet, starting empty");
                Ok(MemoryBank::default())
            }
        }
    }

    /// Replace the persisted bank. Never falls back on failure.
    pub async fn save(&self, bank: &MemoryBank) -> Result<(), MemoryError> {
        let document = bank.to_json_pretty()?;
        self.backend.put(&self.key, &document).await?;
        debug!(backend = %self.backend.name(), users = bank.users.len(), "Saved memory bank");
        Ok(())
    }

    /// Overwrite the persisted bank with an empty one.
    pub async fn reset(&self) -> Result<(), MemoryError> {
        self.save(&MemoryBank::default()).await
    }
}
