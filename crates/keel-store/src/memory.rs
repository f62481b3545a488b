//! In-memory session store.
//!
//! Reference [`SessionStore`] implementation backed by a `RwLock`-guarded
//! map. Suitable for tests and embedders that do not need durability.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::errors::StoreError;
use crate::store::{SessionRecord, SessionStore};

/// In-memory [`SessionStore`].
#[derive(Default)]
pub struct MemorySessionStore {
    records: RwLock<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.records.read().get(id).cloned())
    }

    fn put(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let mut stored = record.clone();
        stored.updated_at = chrono::Utc::now().to_rfc3339();
        debug!(session_id = %stored.id, messages = stored.history.len(), "session persisted");
        let _ = self.records.write().insert(stored.id.clone(), stored);
        Ok(())
    }

    fn copy(&self, source_id: &str, new_id: &str) -> Result<SessionRecord, StoreError> {
        let mut records = self.records.write();
        let source = records
            .get(source_id)
            .ok_or_else(|| StoreError::NotFound(source_id.to_owned()))?;

        let now = chrono::Utc::now().to_rfc3339();
        let forked = SessionRecord {
            id: new_id.to_owned(),
            parent_session_id: Some(source_id.to_owned()),
            forked: true,
            history: source.history.clone(),
            turns_used: source.turns_used,
            total_cost_usd: source.total_cost_usd,
            created_at: now.clone(),
            updated_at: now,
        };
        debug!(source_id, new_id, "session forked");
        let _ = records.insert(new_id.to_owned(), forked.clone());
        Ok(forked)
    }

    fn contains(&self, id: &str) -> bool {
        self.records.read().contains_key(id)
    }
}

impl std::fmt::Debug for MemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySessionStore")
            .field("record_count", &self.len())
            .finish()
    }
}
