//! Request pipeline stages shared by the API routes.
//!
//! - `request_logging_middleware` records method, path, status and latency
//! - `content_negotiation_middleware` enforces the media types the API speaks
//! - [`JsonBody`] parses a request body as JSON whatever its declared type
//! - `cors_layer` and `handle_panic` configure the tower-http layers

use std::any::Any;

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Request, State},
    http::{Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};

use crate::error::ServerError;
use crate::state::AppState;

/// Media types accepted in request bodies and offered in responses.
const SUPPORTED_MEDIA_TYPES: [&str; 2] = ["application/json", "text/plain"];

// ─────────────────────────────────────────────────────────────────────────────
// Request logging
// ─────────────────────────────────────────────────────────────────────────────

/// Log every request with its outcome.
pub async fn request_logging_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.request_logging {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        tracing::info!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Request completed"
        );
    }

    response
}

// ─────────────────────────────────────────────────────────────────────────────
// Content negotiation
// ─────────────────────────────────────────────────────────────────────────────

/// Reject requests whose body or `Accept` header the API cannot serve.
///
/// Bodies of POST, PUT and PATCH requests must be declared as JSON or plain
/// text. An `Accept` header, when present, must admit one of those types.
pub async fn content_negotiation_middleware(
    request: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let method = request.method().clone();
    let carries_body = method == Method::POST || method == Method::PUT || method == Method::PATCH;

    if carries_body {
        let content_type = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());

        match content_type {
            Some(value) if is_supported_content_type(value) => {}
            Some(value) => {
                return Err(ServerError::UnsupportedMediaType(format!(
                    "content type '{}' is not supported",
                    value
                )));
            }
            None => {
                return Err(ServerError::UnsupportedMediaType(
                    "missing content type".to_string(),
                ));
            }
        }
    }

    if let Some(accept) = request.headers().get(header::ACCEPT) {
        let acceptable = accept.to_str().map(accepts_supported_type).unwrap_or(false);
        if !acceptable {
            return Err(ServerError::NotAcceptable(
                "response can only be application/json or text/plain".to_string(),
            ));
        }
    }

    Ok(next.run(request).await)
}

/// Strip parameters and normalise case: `Application/JSON; charset=utf-8` → `application/json`.
fn essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn is_supported_content_type(value: &str) -> bool {
    let essence = essence(value);
    SUPPORTED_MEDIA_TYPES.contains(&essence.as_str())
}

fn accepts_supported_type(accept: &str) -> bool {
    accept.split(',').any(|range| {
        if has_zero_quality(range) {
            return false;
        }
        let range = essence(range);
        range.is_empty()
            || range == "*/*"
            || range == "application/*"
            || range == "text/*"
            || SUPPORTED_MEDIA_TYPES.contains(&range.as_str())
    })
}

fn has_zero_quality(range: &str) -> bool {
    range.split(';').skip(1).any(|param| {
        let mut parts = param.splitn(2, '=');
        let name = parts.next().unwrap_or_default().trim();
        let value = parts.next().unwrap_or_default().trim();
        name.eq_ignore_ascii_case("q") && value.parse::<f32>().is_ok_and(|q| q == 0.0)
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Body parsing
// ─────────────────────────────────────────────────────────────────────────────

/// JSON body extractor.
///
/// Unlike `axum::Json` this does not look at `Content-Type`; negotiation has
/// already restricted it, and plain-text bodies are parsed as JSON too.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ServerError::PayloadTooLarge(rejection.body_text())
            } else {
                ServerError::BadRequest(rejection.body_text())
            }
        })?;

        serde_json::from_slice(&bytes)
            .map(JsonBody)
            .map_err(|e| ServerError::BadRequest(format!("invalid request body: {}", e)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Layers
// ─────────────────────────────────────────────────────────────────────────────

/// CORS policy for the API: any origin, no credentials.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_credentials(false)
        .allow_methods([
            Method::OPTIONS,
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::WWW_AUTHENTICATE,
            header::CONTENT_TYPE,
        ])
}

/// Turn a handler panic into a 500 response.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    ServerError::Internal(format!("handler panicked: {}", detail)).into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
