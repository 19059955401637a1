//! Configuration for the session store.

use std::time::Duration;

/// Default idle timeout for sessions (1 hour).
///
/// A session is absent once this much time has passed since its last `put`.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_millis(3_600_000);

/// Default interval between background sweeps of expired sessions.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for a [`MemoryStore`](crate::MemoryStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of live sessions. `None` means unbounded.
    pub max_sessions: Option<usize>,

    /// Whether to run periodic cleanup of expired sessions.
    /// If false, expired sessions are only dropped when they are looked up.
    pub enable_cleanup_task: bool,

    /// Interval for the cleanup task (if enabled).
    pub cleanup_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_sessions: None,
            enable_cleanup_task: true,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of live sessions.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = Some(max);
        self
    }

    /// Enable or disable the background cleanup task.
    pub fn with_cleanup_task(mut self, enabled: bool) -> Self {
        self.enable_cleanup_task = enabled;
        self
    }

    /// Set the cleanup interval.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}
