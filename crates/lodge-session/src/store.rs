//! Session store contract and the in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::session::Session;

/// Async session store.
///
/// Unknown and expired ids are reported as `Ok(None)`. Errors are reserved
/// for failures of the store itself.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Allocate a new session with a fresh id and empty data.
    ///
    /// The session is not persisted until it is passed to [`put`](Self::put).
    fn create(&self, timeout: Duration) -> Session {
        Session::new(Session::generate_id(), timeout)
    }

    /// Persist a session under its id, restarting its idle timeout.
    async fn put(&self, session: Session) -> Result<()>;

    /// Look up a live session by id.
    async fn get(&self, id: &str) -> Result<Option<Session>>;
}

/// Shared handle to a session store implementation.
pub type SharedSessionStore = Arc<dyn SessionStore>;

#[derive(Debug)]
struct Entry {
    session: Session,
    stored_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.session.timeout()
    }
}

/// In-memory session store.
///
/// Sessions live in process memory only and are lost on shutdown. Expired
/// sessions are dropped when a lookup encounters them, by
/// [`cleanup_expired`](Self::cleanup_expired), and by the optional background
/// task started with [`spawn_cleanup_task`](Self::spawn_cleanup_task).
///
/// Cloning the store yields another handle to the same sessions.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    sessions: Arc<RwLock<HashMap<String, Entry>>>,
    closed: Arc<AtomicBool>,
    config: StoreConfig,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    /// Get the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of live (unexpired) sessions.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.sessions
            .read()
            .await
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// Check if the store holds no live sessions.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Get store statistics.
    pub async fn stats(&self) -> StoreStats {
        let now = Instant::now();
        let sessions = self.sessions.read().await;
        let expired = sessions
            .values()
            .filter(|entry| entry.is_expired(now))
            .count();
        StoreStats {
            live: sessions.len() - expired,
            expired,
            capacity: self.config.max_sessions,
        }
    }

    /// Drop every expired session, returning how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_expired(now));
        let count = before - sessions.len();

        if count > 0 {
            debug!(count = count, remaining = sessions.len(), "Cleaned up expired sessions");
        }

        count
    }

    /// Remove all sessions.
    pub async fn clear(&self) {
        self.sessions.write().await.clear();
    }

    /// Close the store. Later operations fail with [`Error::Unavailable`]
    /// and the cleanup task stops at its next tick.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Session store closed");
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Start the background sweep of expired sessions.
    ///
    /// Returns `None` when the cleanup task is disabled in the configuration.
    /// The task ends once the store is closed, or when the handle is aborted.
    pub fn spawn_cleanup_task(&self) -> Option<JoinHandle<()>> {
        if !self.config.enable_cleanup_task {
            return None;
        }

        let store = self.clone();
        let period = self.config.cleanup_interval;

        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                interval.tick().await;
                if store.is_closed() {
                    debug!("Session cleanup task stopping");
                    break;
                }
                store.cleanup_expired().await;
            }
        }))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Unavailable("store is closed".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn put(&self, session: Session) -> Result<()> {
        self.ensure_open()?;

        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        if let Some(max) = self.config.max_sessions
            && !sessions.contains_key(session.id())
            && sessions.len() >= max
        {
            sessions.retain(|_, entry| !entry.is_expired(now));
            if sessions.len() >= max {
                return Err(Error::CapacityExceeded { max });
            }
        }

        let id = session.id().to_string();
        sessions.insert(
            id.clone(),
            Entry {
                session,
                stored_at: now,
            },
        );

        trace!(session_id = %id, store_size = sessions.len(), "Session stored");

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        self.ensure_open()?;

        let now = Instant::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(id) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => {
                    trace!(session_id = %id, "Session found");
                    return Ok(Some(entry.session.clone()));
                }
                Some(_) => {}
            }
        }

        // Expired: evict it, unless it was put again since we looked.
        let mut sessions = self.sessions.write().await;
        if sessions.get(id).is_some_and(|entry| entry.is_expired(now)) {
            sessions.remove(id);
            debug!(session_id = %id, "Session expired, removed from store");
        }

        Ok(None)
    }
}

/// Store statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Sessions that can still be looked up.
    pub live: usize,

    /// Expired sessions not yet swept.
    pub expired: usize,

    /// Configured capacity, if any.
    pub capacity: Option<usize>,
}
