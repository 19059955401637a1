//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use lodge_config::{LodgeConfig, PROJECT_CONFIG_FILE};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./lodge.toml) instead of user config
        #[arg(long)]
        local: bool,
    },

    /// Show configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(),
        ConfigCommand::Init { local } => cmd_init(local),
        ConfigCommand::Path => cmd_path(),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = lodge_config::load_config(None)?;

    println!("# Lodge Configuration\n");

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("# No config files loaded (using defaults)\n");
    } else {
        for source in &sources {
            println!("# from {}", source.display());
        }
        println!();
    }

    for warning in &loaded.warnings {
        eprintln!("warning: {}", warning);
    }

    let resolved = resolved_config(&loaded.config);
    print!("{}", resolved.to_toml()?);

    if ctx.verbose {
        let addr = resolved.server().socket_addr()?;
        println!("\n# Listening address: {}", addr);
    }

    Ok(())
}

fn cmd_which() -> Result<()> {
    let loaded = lodge_config::load_config(None)?;

    println!("Config file search order (later overrides earlier):\n");

    for source in &loaded.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!("  {} {}", status, source.path.display());
    }

    println!();
    let loaded_count = loaded.loaded_from().len();
    if loaded_count == 0 {
        println!("No config files found. Run 'lodge config init' to create one.");
    } else {
        println!("{} config file(s) loaded.", loaded_count);
    }

    Ok(())
}

fn cmd_init(local: bool) -> Result<()> {
    let path = if local {
        PathBuf::from(PROJECT_CONFIG_FILE)
    } else {
        lodge_config::xdg_config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
    };

    if path.exists() {
        println!("Config file already exists: {}", path.display());
        return Ok(());
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, CONFIG_TEMPLATE)?;

    println!("Created config file: {}", path.display());
    Ok(())
}

fn cmd_path() -> Result<()> {
    if let Some(path) = lodge_config::xdg_config_path() {
        println!("{}", path.display());
    } else {
        eprintln!("Could not determine config directory");
    }
    Ok(())
}

/// Every section filled in, with defaults for the ones no file set.
fn resolved_config(config: &LodgeConfig) -> LodgeConfig {
    LodgeConfig {
        server: Some(config.server()),
        session: Some(config.session()),
    }
}

const CONFIG_TEMPLATE: &str = r#"# Lodge Configuration

[server]
bind = "0.0.0.0"
port = 80
tcp_keepalive = true
# Close connections with no traffic for this long
idle_timeout_secs = 10
request_logging = true
max_body_size = 1048576

[session]
# Sessions expire this long after they were last stored
timeout_ms = 3600000
# max_sessions = 100000
cleanup_interval_secs = 60
cleanup_task = true
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_is_valid_default_config() {
        let config = LodgeConfig::from_toml(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config, resolved_config(&LodgeConfig::new()));
    }

    #[test]
    fn test_resolved_config_keeps_overrides() {
        let config = LodgeConfig::from_toml("[session]\ntimeout_ms = 10\n").unwrap();
        let resolved = resolved_config(&config);

        assert_eq!(resolved.session().timeout_ms, 10);
        assert_eq!(resolved.server(), lodge_config::ServerConfig::default());
    }
}
