//! Start command - launches the Lodge server.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;

use lodge_config::{LoadedConfig, LodgeConfig};
use lodge_server::{Server, ServerConfig};
use lodge_session::{MemoryStore, StoreConfig};

use super::Context;

/// Arguments for the start command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug, Default)]
pub struct StartArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Load this config file instead of discovering one
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    let loaded = match &args.config {
        Some(path) => LoadedConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => lodge_config::load_config(None)?,
    };

    for warning in &loaded.warnings {
        eprintln!("warning: {}", warning);
    }

    if ctx.verbose {
        let sources = loaded.loaded_from();
        if sources.is_empty() {
            println!("No config files found, using defaults + CLI args");
        } else {
            for source in sources {
                println!("Loaded config: {}", source.display());
            }
        }
    }

    let (server_config, store_config) = resolve(&args, &loaded.config)?;

    if ctx.verbose {
        println!("Bind address: {}", server_config.bind_address);
        println!("Session timeout: {:?}", server_config.session_timeout);
        match store_config.max_sessions {
            Some(max) => println!("Session capacity: {}", max),
            None => println!("Session capacity: unbounded"),
        }
    }

    let store = MemoryStore::new(store_config);
    let cleanup = store.spawn_cleanup_task();

    let mut server = Server::new(store.clone(), server_config);
    let addr = server.start().await?;
    println!("Lodge listening on http://{}", addr);

    wait_for_shutdown_signal().await?;
    tracing::info!("Shutdown signal received");

    let stopped = server.stop().await;

    store.close();
    if let Some(handle) = cleanup {
        handle.abort();
    }

    stopped?;
    Ok(())
}

/// Wait for Ctrl-C, or SIGTERM on Unix.
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("Failed to listen for Ctrl-C")?,
            _ = term.recv() => {}
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")
    }
}

/// Merge CLI overrides into the file config and build runtime settings.
fn resolve(args: &StartArgs, config: &LodgeConfig) -> Result<(ServerConfig, StoreConfig)> {
    let mut server_file = config.server();
    if let Some(port) = args.port {
        server_file.port = port;
    }
    if let Some(bind) = &args.bind {
        server_file.bind = bind.clone();
    }

    let session_file = config.session();

    let server_config = ServerConfig::new()
        .with_bind_address(server_file.socket_addr()?)
        .with_tcp_keepalive(server_file.tcp_keepalive)
        .with_idle_timeout(server_file.idle_timeout())
        .with_request_logging(server_file.request_logging)
        .with_max_body_size(server_file.max_body_size)
        .with_session_timeout(session_file.timeout());

    let mut store_config = StoreConfig::new()
        .with_cleanup_task(session_file.cleanup_task)
        .with_cleanup_interval(session_file.cleanup_interval());
    if let Some(max) = session_file.max_sessions {
        store_config = store_config.with_max_sessions(max);
    }

    Ok((server_config, store_config))
}
