//! Session lookup endpoint.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::middleware::JsonBody;
use crate::state::AppState;

/// Request for the data of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoRequest {
    pub session_id: String,
}

/// POST /v0/info - Return the data stored in a session.
///
/// Unknown and expired sessions answer 401 with an empty body; a store
/// failure answers 500 with an empty body.
pub async fn info_handler(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<InfoRequest>,
) -> Response {
    match state.store.get(&request.session_id).await {
        Ok(Some(session)) => {
            debug!(session_id = %request.session_id, "Session found");
            (StatusCode::OK, Json(Value::Object(session.into_data()))).into_response()
        }
        Ok(None) => {
            debug!(session_id = %request.session_id, "Session not found");
            StatusCode::UNAUTHORIZED.into_response()
        }
        Err(e) => {
            error!(session_id = %request.session_id, error = %e, "Failed to load session");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
