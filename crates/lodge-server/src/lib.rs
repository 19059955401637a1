//! HTTP API server for Lodge.
//!
//! Two endpoints under `/v0` issue and look up server-side sessions:
//!
//! - `POST /v0/login` opens a session for a `userKey`
//! - `POST /v0/info` returns the data stored in a session
//!
//! Every request passes the same layer stack: panic capture, tracing and
//! request logging, then for `/v0` CORS, content negotiation and JSON body
//! parsing. Connections are served by a [`GuardedListener`] that applies
//! TCP keep-alive and an idle timeout.
//!
//! # Example
//!
//! ```ignore
//! use lodge_server::{Server, ServerConfig};
//! use lodge_session::{MemoryStore, StoreConfig};
//!
//! let config = ServerConfig::new().with_bind_address("127.0.0.1:8080".parse()?);
//! let mut server = Server::new(MemoryStore::new(StoreConfig::default()), config);
//!
//! let addr = server.start().await?;
//! // ...
//! server.stop().await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod transport;

pub use config::ServerConfig;
pub use error::{ErrorResponse, Result, ServerError};
pub use middleware::{
    JsonBody, content_negotiation_middleware, cors_layer, request_logging_middleware,
};
pub use routes::{InfoRequest, LoginRequest, LoginResponse};
pub use state::AppState;
pub use transport::{GuardedListener, GuardedStream};

use std::fmt;
use std::net::SocketAddr;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, header},
    routing::post,
};
use lodge_session::SessionStore;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::{
    catch_panic::CatchPanicLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::info;

/// Content type of every `/v0` response.
const API_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Where a [`Server`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// A listener being served in the background.
struct Running {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

/// The Lodge HTTP server.
pub struct Server {
    /// Application state.
    state: AppState,
    lifecycle: LifecycleState,
    running: Option<Running>,
}

impl Server {
    /// Create a new server around a session store.
    pub fn new(store: impl SessionStore + 'static, config: ServerConfig) -> Self {
        Self::from_state(AppState::new(store, config))
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self {
            state,
            lifecycle: LifecycleState::Stopped,
            running: None,
        }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .nest("/v0", self.v0_routes())
            // Request logging (inner layer, sees the final status)
            .layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                middleware::request_logging_middleware,
            ))
            // TraceLayer for detailed HTTP tracing
            .layer(TraceLayer::new_for_http())
            // Outermost: a panic anywhere below becomes a 500
            .layer(CatchPanicLayer::custom(middleware::handle_panic))
            .with_state(self.state.clone())
    }

    /// API routes (v0).
    ///
    /// Layers run outermost first: CORS (answers preflights), forced JSON
    /// content type, content negotiation, body limit.
    fn v0_routes(&self) -> Router<AppState> {
        Router::new()
            .route("/login", post(routes::login_handler))
            .route("/info", post(routes::info_handler))
            .layer(DefaultBodyLimit::max(self.state.config.max_body_size))
            .layer(axum::middleware::from_fn(
                middleware::content_negotiation_middleware,
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::CONTENT_TYPE,
                HeaderValue::from_static(API_CONTENT_TYPE),
            ))
            .layer(middleware::cors_layer())
    }

    /// Bind the listener and start serving in the background.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// port 0 was requested.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if self.running.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let config = &self.state.config;
        let addr = config.bind_address;
        self.lifecycle = LifecycleState::Starting;

        let bound = GuardedListener::bind(addr, config.tcp_keepalive, config.idle_timeout)
            .and_then(|listener| listener.local_addr().map(|local| (listener, local)));
        let (listener, local_addr) = match bound {
            Ok(bound) => bound,
            Err(source) => {
                self.lifecycle = LifecycleState::Stopped;
                return Err(ServerError::Bind { addr, source });
            }
        };

        let router = self.router();
        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    // A dropped sender also means shut down.
                    let _ = signal.await;
                })
                .await
        });

        info!(addr = %local_addr, "Server listening");

        self.running = Some(Running {
            local_addr,
            shutdown,
            task,
        });
        self.lifecycle = LifecycleState::Running;

        Ok(local_addr)
    }

    /// Stop accepting connections and wait for in-flight requests.
    ///
    /// Stopping a server that is not running succeeds.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };

        self.lifecycle = LifecycleState::Stopping;
        info!(addr = %running.local_addr, "Server stopping");

        let _ = running.shutdown.send(());
        let outcome = running.task.await;
        self.lifecycle = LifecycleState::Stopped;

        match outcome {
            Ok(Ok(())) => {
                info!("Server stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(ServerError::Internal(format!("Server error: {}", e))),
            Err(e) => Err(ServerError::Internal(format!("Server task failed: {}", e))),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.lifecycle
    }

    /// Address of the active listener, if running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use lodge_session::{MemoryStore, StoreConfig};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tower::ServiceExt;

    fn test_store() -> MemoryStore {
        MemoryStore::new(StoreConfig::default().with_cleanup_task(false))
    }

    fn local_config() -> ServerConfig {
        ServerConfig::new()
            .with_bind_address("127.0.0.1:0".parse().unwrap())
            .with_request_logging(false)
    }

    fn json_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    // ── Router ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_login_then_info() {
        let server = Server::new(test_store(), local_config());
        let app = server.router();

        let login = app
            .clone()
            .oneshot(json_post("/v0/login", r#"{"userKey":"u1"}"#))
            .await
            .unwrap();
        assert_eq!(login.status(), StatusCode::OK);
        let login = json_body(login).await;
        let session_id = login["sessionId"].as_str().unwrap().to_string();

        let info = app
            .oneshot(json_post(
                "/v0/info",
                &serde_json::json!({ "sessionId": session_id }).to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(info.status(), StatusCode::OK);
        assert_eq!(json_body(info).await, serde_json::json!({ "userKey": "u1" }));
    }

    #[tokio::test]
    async fn test_responses_forced_to_json_content_type() {
        let app = Server::new(test_store(), local_config()).router();

        let ok = app
            .clone()
            .oneshot(json_post("/v0/login", r#"{"userKey":"u1"}"#))
            .await
            .unwrap();
        assert_eq!(
            ok.headers().get(header::CONTENT_TYPE).unwrap(),
            API_CONTENT_TYPE
        );

        let unauthorized = app
            .oneshot(json_post("/v0/info", r#"{"sessionId":"bogus"}"#))
            .await
            .unwrap();
        assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            unauthorized.headers().get(header::CONTENT_TYPE).unwrap(),
            API_CONTENT_TYPE
        );
    }

    #[tokio::test]
    async fn test_unsupported_media_type() {
        let app = Server::new(test_store(), local_config()).router();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v0/login")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("userKey=u1"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_not_acceptable() {
        let app = Server::new(test_store(), local_config()).router();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v0/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::ACCEPT, "text/html")
                    .body(Body::from(r#"{"userKey":"u1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    }

    #[tokio::test]
    async fn test_body_limit_applies() {
        let config = local_config().with_max_body_size(32);
        let app = Server::new(test_store(), config).router();

        let body = format!(r#"{{"userKey":"{}"}}"#, "k".repeat(64));
        let response = app.oneshot(json_post("/v0/login", &body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let app = Server::new(test_store(), local_config()).router();

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/v0/login")
                    .header(header::ORIGIN, "http://example.com")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
        let methods = headers
            .get(header::ACCESS_CONTROL_ALLOW_METHODS)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(methods.contains("POST"));
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
    }

    #[tokio::test]
    async fn test_cors_headers_on_response() {
        let app = Server::new(test_store(), local_config()).router();

        let mut request = json_post("/v0/login", r#"{"userKey":"u1"}"#);
        request
            .headers_mut()
            .insert(header::ORIGIN, HeaderValue::from_static("http://example.com"));
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_unknown_route_and_method() {
        let app = Server::new(test_store(), local_config()).router();

        let missing = app
            .clone()
            .oneshot(json_post("/v0/logout", "{}"))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let wrong_method = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/v0/login")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(wrong_method.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        async fn boom() -> &'static str {
            panic!("handler exploded")
        }

        let state = AppState::new(test_store(), local_config());
        let app = Router::new()
            .route("/boom", axum::routing::get(boom))
            .layer(CatchPanicLayer::custom(middleware::handle_panic))
            .with_state(state);

        let response = app
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_start_and_stop() {
        let mut server = Server::new(test_store(), local_config());
        assert_eq!(server.state(), LifecycleState::Stopped);
        assert!(server.local_addr().is_none());

        let addr = server.start().await.unwrap();
        assert_eq!(server.state(), LifecycleState::Running);
        assert_eq!(server.local_addr(), Some(addr));
        assert_ne!(addr.port(), 0);

        server.stop().await.unwrap();
        assert_eq!(server.state(), LifecycleState::Stopped);
        assert!(server.local_addr().is_none());
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let mut server = Server::new(test_store(), local_config());
        server.stop().await.unwrap();
        assert_eq!(server.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_double_stop() {
        let mut server = Server::new(test_store(), local_config());
        server.start().await.unwrap();

        server.stop().await.unwrap();
        server.stop().await.unwrap();
        assert_eq!(server.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let mut server = Server::new(test_store(), local_config());
        server.start().await.unwrap();

        assert!(matches!(
            server.start().await,
            Err(ServerError::AlreadyRunning)
        ));
        assert_eq!(server.state(), LifecycleState::Running);

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let mut server = Server::new(test_store(), local_config());
        server.start().await.unwrap();
        server.stop().await.unwrap();

        server.start().await.unwrap();
        assert_eq!(server.state(), LifecycleState::Running);
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_conflict_leaves_stopped() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = occupied.local_addr().unwrap();

        let mut server = Server::new(test_store(), local_config().with_bind_address(addr));
        let result = server.start().await;

        assert!(matches!(result, Err(ServerError::Bind { .. })));
        assert_eq!(server.state(), LifecycleState::Stopped);
        assert!(server.local_addr().is_none());
    }

    #[tokio::test]
    async fn test_idle_connection_is_closed() {
        let config = local_config().with_idle_timeout(Duration::from_millis(200));
        let mut server = Server::new(test_store(), config);
        let addr = server.start().await.unwrap();

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        // Half a request line, then silence.
        stream.write_all(b"POST /v0/login HTTP/1.1\r\n").await.unwrap();

        let mut buf = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf)).await;
        assert!(read.is_ok(), "server should close the idle connection");

        server.stop().await.unwrap();
    }
}
