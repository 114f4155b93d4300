use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::ports::SessionStore;

/// Per-visitor key/value bag loaded from, and written back to, a
/// [`SessionRepository`](super::ports::SessionRepository).
///
/// Mutations only flag the bag as modified; the caller decides when to persist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionData {
    values: Map<String, Value>,
    modified: bool,
}

impl SessionData {
    pub fn from_values(values: Map<String, Value>) -> Self {
        Self {
            values,
            modified: false,
        }
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

impl SessionStore for SessionData {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    fn mark_dirty(&mut self) {
        self.modified = true;
    }
}

/// A visitor's session together with the row it is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub id: Uuid,
    pub data: SessionData,
    /// Expiry to write when the session is next persisted.
    pub expires_at: DateTime<Utc>,
}
