//! Application state shared across handlers.

use std::sync::Arc;

use lodge_session::{SessionStore, SharedSessionStore};

use crate::config::ServerConfig;

/// Application state shared across all handlers.
///
/// Handlers reach the session store only through this state; nothing is
/// loaded into the request implicitly.
#[derive(Clone)]
pub struct AppState {
    /// The session store.
    pub store: SharedSessionStore,

    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create application state around a store implementation.
    pub fn new(store: impl SessionStore + 'static, config: ServerConfig) -> Self {
        Self::from_shared(Arc::new(store), config)
    }

    /// Create application state around an already shared store.
    pub fn from_shared(store: SharedSessionStore, config: ServerConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
