//! Error types for session store operations.

/// Error type for session store operations.
///
/// An unknown or expired session is not an error; lookups report it as `None`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The store already holds its maximum number of live sessions.
    #[error("Session store is full ({max} live sessions)")]
    CapacityExceeded {
        /// The configured capacity.
        max: usize,
    },

    /// The store cannot serve requests.
    #[error("Session store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, Error>;
