//! The session store trait and record types.

use serde::{Deserialize, Serialize};

use keel_core::messages::Message;

use crate::errors::StoreError;

/// A persisted session: identity, lineage, history, and budget counters.
///
/// History is the append-only conversation; budget counters are monotonic
/// and survive resume (they are never reset for an existing identity).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Session identity.
    pub id: String,
    /// Session this one was forked from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_session_id: Option<String>,
    /// Whether this record was created by a fork.
    #[serde(default)]
    pub forked: bool,
    /// Ordered conversation history.
    pub history: Vec<Message>,
    /// Turns consumed over the session's lifetime.
    pub turns_used: u32,
    /// Cost accrued over the session's lifetime, in USD.
    pub total_cost_usd: f64,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// ISO 8601 timestamp of the last write.
    pub updated_at: String,
}

impl SessionRecord {
    /// Create a fresh record for a new session.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: id.into(),
            parent_session_id: None,
            forked: false,
            history: Vec::new(),
            turns_used: 0,
            total_cost_usd: 0.0,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Opaque session persistence: get/put/copy over [`SessionRecord`]s.
///
/// `copy` implements copy-on-fork: the source record's history is deep
/// copied under a new identity, leaving the source untouched. Implementations
/// must be safe for concurrent use from multiple sessions.
pub trait SessionStore: Send + Sync {
    /// Load a record by session ID.
    fn get(&self, id: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// Persist a record, replacing any previous record for the same ID.
    fn put(&self, record: &SessionRecord) -> Result<(), StoreError>;

    /// Copy `source_id`'s record under `new_id` (fork lineage recorded).
    ///
    /// The source record is not mutated. Returns the new record.
    fn copy(&self, source_id: &str, new_id: &str) -> Result<SessionRecord, StoreError>;

    /// Whether a record exists for the given ID.
    fn contains(&self, id: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_empty() {
        let record = SessionRecord::new("s1");
        assert_eq!(record.id, "s1");
        assert!(record.history.is_empty());
        assert_eq!(record.turns_used, 0);
        assert!((record.total_cost_usd - 0.0).abs() < f64::EPSILON);
        assert!(record.parent_session_id.is_none());
        assert!(!record.forked);
    }

    #[test]
    fn record_serde_roundtrip() {
        let mut record = SessionRecord::new("s1");
        record.history.push(Message::user("hello"));
        record.turns_used = 3;
        record.total_cost_usd = 0.42;
        let json = serde_json::to_string(&record).unwrap();
        let back: SessionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn record_serde_omits_absent_parent() {
        let record = SessionRecord::new("s1");
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("parentSessionId").is_none());
    }
}
