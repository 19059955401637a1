//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0"
//! port = 80
//! tcp_keepalive = true
//! idle_timeout_secs = 10
//! request_logging = true
//! max_body_size = 1048576
//!
//! [session]
//! timeout_ms = 3600000
//! max_sessions = 100000
//! cleanup_interval_secs = 60
//! cleanup_task = true
//! ```

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 80;

/// Default bind address.
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Default connection idle timeout in seconds.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 10;

/// Default maximum request body size (1 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Default session idle timeout in milliseconds (1 hour).
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 3_600_000;

/// Default interval between expired-session sweeps, in seconds.
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodgeConfig {
    /// Server configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    /// Session store configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionConfig>,
}

impl LodgeConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string and validate it.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: LodgeConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }

        if other.session.is_some() {
            self.session = other.session;
        }
    }

    /// The server section, or defaults when absent.
    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    /// The session section, or defaults when absent.
    pub fn session(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }

    /// Check value ranges in every present section.
    pub fn validate(&self) -> Result<()> {
        if let Some(ref server) = self.server {
            server.validate()?;
        }
        if let Some(ref session) = self.session {
            session.validate()?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind: String,
    /// Port to listen on.
    pub port: u16,
    /// Enable TCP keep-alive on accepted connections.
    pub tcp_keepalive: bool,
    /// Close connections that see no traffic for this many seconds.
    pub idle_timeout_secs: u64,
    /// Enable request logging.
    pub request_logging: bool,
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            tcp_keepalive: true,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            request_logging: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl ServerConfig {
    /// The socket address built from `bind` and `port`.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.bind.parse().map_err(|_| ConfigError::Invalid {
            field: "server.bind".to_string(),
            reason: format!("'{}' is not an IP address", self.bind),
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// The connection idle timeout.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        if self.idle_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "server.idle_timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                field: "server.max_body_size".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Session store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session idle timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of live sessions (unbounded when absent).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_sessions: Option<usize>,
    /// Interval in seconds between expired-session sweeps.
    pub cleanup_interval_secs: u64,
    /// Run the background sweep.
    pub cleanup_task: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
            max_sessions: None,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            cleanup_task: true,
        }
    }
}

impl SessionConfig {
    /// The session idle timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The interval between sweeps.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "session.timeout_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.cleanup_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "session.cleanup_interval_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_sessions == Some(0) {
            return Err(ConfigError::Invalid {
                field: "session.max_sessions".to_string(),
                reason: "must be greater than zero when set".to_string(),
            });
        }
        Ok(())
    }
}
