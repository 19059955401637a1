//! Session issuing endpoint.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::middleware::JsonBody;
use crate::state::AppState;

/// Result code for a successful login.
pub const CODE_OK: i32 = 0;

/// Result code for a login the store could not persist.
pub const CODE_FAILED: i32 = -1;

/// Request to open a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Opaque client key stored in the session.
    pub user_key: String,
}

/// Login outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_key: Option<String>,
}

impl LoginResponse {
    pub fn success(session_id: impl Into<String>, user_key: impl Into<String>) -> Self {
        Self {
            code: CODE_OK,
            session_id: Some(session_id.into()),
            user_key: Some(user_key.into()),
        }
    }

    pub fn failure() -> Self {
        Self {
            code: CODE_FAILED,
            session_id: None,
            user_key: None,
        }
    }
}

/// POST /v0/login - Create a session for `userKey`.
///
/// Every call opens a fresh session; earlier sessions for the same key stay
/// valid until they expire.
pub async fn login_handler(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> (StatusCode, Json<LoginResponse>) {
    let mut session = state.store.create(state.config.session_timeout);
    session.insert("userKey", request.user_key.clone());
    let session_id = session.id().to_string();

    match state.store.put(session).await {
        Ok(()) => {
            info!(session_id = %session_id, "Session created");
            debug!(session_id = %session_id, user_key = %request.user_key, "Session data stored");
            (
                StatusCode::OK,
                Json(LoginResponse::success(session_id, request.user_key)),
            )
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to store session");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(LoginResponse::failure()),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request, header},
        routing::post,
    };
    use lodge_session::{MemoryStore, SessionStore, StoreConfig};
    use tower::ServiceExt;

    use crate::config::ServerConfig;

    fn app(store: MemoryStore) -> Router {
        let state = AppState::new(store, ServerConfig::default());
        Router::new()
            .route("/login", post(login_handler))
            .with_state(state)
    }

    fn login_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/login")
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

    #[test]
    fn test_failure_omits_session_fields() {
        let json = serde_json::to_value(LoginResponse::failure()).unwrap();
        assert_eq!(json, serde_json::json!({ "code": -1 }));
    }

    #[tokio::test]
    async fn test_login_creates_session() {
        let store = MemoryStore::new(StoreConfig::default().with_cleanup_task(false));
        let response = app(store.clone())
            .oneshot(login_request(r#"{"userKey":"u1"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["code"], 0);
        assert_eq!(json["userKey"], "u1");

        let session_id = json["sessionId"].as_str().unwrap();
        assert_eq!(session_id.len(), 32);

        let session = store.get(session_id).await.unwrap().unwrap();
        assert_eq!(session.get("userKey"), Some(&serde_json::json!("u1")));
    }

    #[tokio::test]
    async fn test_login_twice_gives_distinct_sessions() {
        let store = MemoryStore::new(StoreConfig::default().with_cleanup_task(false));
        let app = app(store.clone());

        let first = json_body(
            app.clone()
                .oneshot(login_request(r#"{"userKey":"same"}"#))
                .await
                .unwrap(),
        )
        .await;
        let second = json_body(
            app.oneshot(login_request(r#"{"userKey":"same"}"#))
                .await
                .unwrap(),
        )
        .await;

        assert_ne!(first["sessionId"], second["sessionId"]);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_login_store_failure() {
        let store = MemoryStore::new(StoreConfig::default().with_cleanup_task(false));
        store.close();

        let response = app(store)
            .oneshot(login_request(r#"{"userKey":"u1"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await, serde_json::json!({ "code": -1 }));
    }

    #[tokio::test]
    async fn test_login_at_capacity_fails() {
        let store = MemoryStore::new(
            StoreConfig::default()
                .with_cleanup_task(false)
                .with_max_sessions(1),
        );
        let app = app(store);

        let first = app
            .clone()
            .oneshot(login_request(r#"{"userKey":"a"}"#))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(login_request(r#"{"userKey":"b"}"#))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_login_missing_user_key() {
        let store = MemoryStore::new(StoreConfig::default().with_cleanup_task(false));
        let response = app(store.clone())
            .oneshot(login_request(r#"{"user":"u1"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_login_non_string_user_key() {
        let store = MemoryStore::new(StoreConfig::default().with_cleanup_task(false));
        let response = app(store)
            .oneshot(login_request(r#"{"userKey":42}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
