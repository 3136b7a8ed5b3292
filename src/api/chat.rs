use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};

use crate::error::ProxyError;
use crate::normalize::{normalize_messages, ChatRequest};
use crate::relay::forward_with_failover;
use crate::state::AppState;

/// `POST /api/v1/chat/completions` — the proxy entry point.
pub async fn handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match proxy_chat(&state, &body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn proxy_chat(state: &AppState, body: &[u8]) -> Result<Response, ProxyError> {
    let mut request: ChatRequest = serde_json::from_slice(body)
        .map_err(|err| ProxyError::MalformedBody(err.to_string()))?;

    // Validation errors short-circuit here; no upstream call is attempted.
    let has_images = normalize_messages(&mut request.messages)?;
    let endpoints = state.resolver.resolve(&request.model, has_images)?;

    let outbound = serde_json::to_vec(&request)
        .map_err(|err| ProxyError::Internal(format!("failed to encode outbound body: {err}")))?;

    forward_with_failover(
        state,
        endpoints,
        &request.model,
        request.stream,
        Bytes::from(outbound),
    )
    .await
}
