//! Session store with idle expiry.
//!
//! This crate provides the server-side session record used by Lodge:
//! - [`Session`] carries an opaque id, a JSON data object and an idle timeout
//! - [`SessionStore`] is the async create/put/get contract handlers rely on
//! - [`MemoryStore`] keeps sessions in process memory, expiring them lazily
//!   on access and optionally through a background sweep
//!
//! # Example
//!
//! ```rust,ignore
//! use lodge_session::{DEFAULT_SESSION_TIMEOUT, MemoryStore, SessionStore, StoreConfig};
//!
//! let store = MemoryStore::new(StoreConfig::default());
//!
//! let mut session = store.create(DEFAULT_SESSION_TIMEOUT);
//! session.insert("userKey", "u1");
//! let id = session.id().to_string();
//! store.put(session).await?;
//!
//! let loaded = store.get(&id).await?.expect("session is live");
//! assert_eq!(loaded.get("userKey"), Some(&"u1".into()));
//! ```

mod config;
mod error;
mod session;
mod store;

pub use config::{DEFAULT_CLEANUP_INTERVAL, DEFAULT_SESSION_TIMEOUT, StoreConfig};
pub use error::{Error, Result};
pub use session::Session;
pub use store::{MemoryStore, SessionStore, SharedSessionStore, StoreStats};
