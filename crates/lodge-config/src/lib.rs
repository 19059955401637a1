//! Configuration system for the Lodge session service.
//!
//! Provides TOML-based configuration with:
//! - A `[server]` section for the listener and request pipeline
//! - A `[session]` section for the session store
//! - Config file layering (user config + project-local overrides)
//!
//! Every section and field is optional; missing values fall back to the
//! defaults documented on [`ServerConfig`] and [`SessionConfig`].

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, PROJECT_CONFIG_FILE, load_config, load_config_file,
    load_config_with_options, save_config, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
