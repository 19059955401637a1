//! The session record.

use std::time::Duration;

use serde_json::{Map, Value};

/// A server-side session.
///
/// Sessions are produced by [`SessionStore::create`](crate::SessionStore::create)
/// and only become visible to lookups once they are handed to
/// [`SessionStore::put`](crate::SessionStore::put). Lookups return owned
/// copies, so changing a loaded session has no effect until it is put again.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: String,
    data: Map<String, Value>,
    timeout: Duration,
}

impl Session {
    /// Create an empty session with the given id and idle timeout.
    pub fn new(id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            id: id.into(),
            data: Map::new(),
            timeout,
        }
    }

    /// Generate a fresh opaque session id (32 lowercase hex characters).
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// The session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Idle timeout after which the stored session is considered absent.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The session data object.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Look up a single data value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Insert a data value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.data.insert(key.into(), value.into())
    }

    /// Remove a data value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Consume the session, returning its data object.
    pub fn into_data(self) -> Map<String, Value> {
        self.data
    }
}
