//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde_json::Value;

use lodge_server::{Server, ServerConfig};
use lodge_session::{MemoryStore, StoreConfig};

/// A server listening on an ephemeral loopback port.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// HTTP client for this server.
    pub client: Client,
    /// Store backing the server, for inspection.
    pub store: MemoryStore,
    server: Server,
}

impl TestServer {
    /// Start a server with default settings.
    pub async fn start() -> Result<Self> {
        Self::start_with(StoreConfig::default(), ServerConfig::new()).await
    }

    /// Start a server whose sessions expire after `timeout`.
    pub async fn start_with_session_timeout(timeout: Duration) -> Result<Self> {
        Self::start_with(
            StoreConfig::default(),
            ServerConfig::new().with_session_timeout(timeout),
        )
        .await
    }

    /// Start a server with explicit store and server configuration.
    ///
    /// The bind address is always replaced by `127.0.0.1:0`.
    pub async fn start_with(store_config: StoreConfig, config: ServerConfig) -> Result<Self> {
        let store = MemoryStore::new(store_config.with_cleanup_task(false));
        let config = config
            .with_bind_address("127.0.0.1:0".parse()?)
            .with_request_logging(false);

        let mut server = Server::new(store.clone(), config);
        let addr = server.start().await?;

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            addr,
            client,
            store,
            server,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// POST a JSON body to a path.
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(format!("{}{}", self.base_url(), path))
    }

    /// Log in and return the new session id.
    pub async fn login(&self, user_key: &str) -> Result<String> {
        let resp = self
            .post("/v0/login")
            .json(&serde_json::json!({ "userKey": user_key }))
            .send()
            .await?;
        anyhow::ensure!(resp.status().is_success(), "login failed: {}", resp.status());

        let body: Value = resp.json().await?;
        body["sessionId"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("login response has no sessionId: {}", body))
    }

    /// Fetch session info, returning the raw response.
    pub async fn info(&self, session_id: &str) -> Result<reqwest::Response> {
        Ok(self
            .post("/v0/info")
            .json(&serde_json::json!({ "sessionId": session_id }))
            .send()
            .await?)
    }

    /// Stop the server.
    pub async fn stop(mut self) -> Result<()> {
        self.server.stop().await?;
        Ok(())
    }
}
