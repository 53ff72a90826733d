//! Webhook handler for merge-request events

use axum::{
    Json,
    body::{Bytes, to_bytes},
    extract::{Request, State as AxumState},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, trace};

use crate::SharedState;
use crate::dispatch::MSG_SUCCESS;
use crate::error::HookError;
use crate::webhook::HookEvent;

/// Body of every non-GET response. `code` is always 200.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookResponse {
    pub code: u16,
    pub msg: String,
    pub data: Option<Value>,
}

impl HookResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            msg: msg.into(),
            data: None,
        }
    }

    pub fn success() -> Self {
        Self::new(MSG_SUCCESS)
    }
}

/// Handles every inbound request, whatever its path or method.
pub async fn handle_hook(AxumState(state): AxumState<SharedState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    // path plus query string, as received
    let url = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path(), |pq| pq.as_str())
        .to_string();

    trace!("Received request, method: {}, url: {}", parts.method, url);

    if parts.method == Method::GET {
        error!("Ignore GET request to {}", url);
        return StatusCode::OK.into_response();
    }

    let mut response = HookResponse::success();

    // the whole body is read, however large
    let body = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("{}", HookError::BodyRead(e.to_string()));
            Bytes::new()
        }
    };

    match serde_json::from_slice::<HookEvent>(&body) {
        Ok(event) => {
            let decision = state.dispatcher.dispatch(&url, &event);
            response = HookResponse::new(decision.message());
        }
        Err(e) => error!("{}", HookError::Decode(e)),
    }

    Json(response).into_response()
}
