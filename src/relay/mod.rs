pub mod ident;

use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use futures_util::TryStreamExt;
use http::header::{HeaderName, ACCEPT, CONNECTION, CONTENT_TYPE, TRANSFER_ENCODING};
use http::HeaderValue;

use crate::error::ProxyError;
use crate::state::AppState;

use ident::correlation_id;

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
// Sent as `UserID` on the wire; header names are case-insensitive.
const USER_ID_HEADER: HeaderName = HeaderName::from_static("userid");
const ACCEPT_STREAM: HeaderValue = HeaderValue::from_static("text/event-stream");
const ACCEPT_JSON: HeaderValue = HeaderValue::from_static("application/json");
const CONTENT_TYPE_JSON: HeaderValue = HeaderValue::from_static("application/json");

/// Deliver the normalized request body to exactly one upstream and relay its
/// response, or fail once every candidate has failed.
///
/// Candidates are tried strictly in order. The first successful 2xx header
/// exchange is terminal: the upstream response is spliced onto the caller's
/// connection and no further candidates are tried, even if the body relay
/// breaks mid-stream. Candidates are never raced in parallel and the same
/// endpoint is never retried.
///
/// # Errors
///
/// Returns `ProxyError::AllCandidatesExhausted` carrying the last recorded
/// attempt error when no candidate produces a 2xx response.
pub async fn forward_with_failover(
    state: &AppState,
    endpoints: &[String],
    model: &str,
    stream: bool,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let mut last_err: Option<ProxyError> = None;

    for endpoint in endpoints {
        let target_url = format!("{endpoint}{CHAT_COMPLETIONS_PATH}");
        tracing::info!(url = %target_url, model, "attempting upstream");

        match send_attempt(state, &target_url, stream, body.clone()).await {
            Ok(upstream) => {
                tracing::info!(url = %target_url, "upstream accepted, relaying response");
                return Ok(relay_response(upstream));
            }
            Err(err) => {
                tracing::warn!(url = %target_url, error = %err, "upstream attempt failed");
                last_err = Some(err);
            }
        }
    }

    let last = last_err.map_or_else(
        || "no endpoints were attempted".to_string(),
        |err| err.to_string(),
    );
    Err(ProxyError::AllCandidatesExhausted { last })
}

/// Issue one outbound call. The future inherits the caller's cancellation:
/// when the client disconnects, axum drops the handler future and the
/// in-flight request (or body stream) is aborted with it.
async fn send_attempt(
    state: &AppState,
    url: &str,
    stream: bool,
    body: Bytes,
) -> Result<reqwest::Response, ProxyError> {
    let accept = if stream { ACCEPT_STREAM } else { ACCEPT_JSON };

    // Headers are built from scratch; inbound hop-by-hop headers such as
    // `Connection` never reach the upstream.
    let response = state
        .client
        .post(url)
        .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
        .header(ACCEPT, accept)
        .header(USER_ID_HEADER, correlation_id())
        .body(body)
        .send()
        .await
        .map_err(|err| ProxyError::UpstreamAttempt {
            url: url.to_string(),
            message: err.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        // Drain the body so the diagnostic ends up in the recorded error and
        // the connection can be reused.
        let detail = match response.bytes().await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => format!("<unreadable body: {err}>"),
        };
        return Err(ProxyError::UpstreamAttempt {
            url: url.to_string(),
            message: format!("upstream returned status {status}: {detail}"),
        });
    }

    Ok(response)
}

/// Splice a committed upstream response onto the caller's connection:
/// status, headers, then the body relayed chunk by chunk without buffering.
fn relay_response(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let upstream_headers = upstream.headers().clone();

    let body = Body::from_stream(upstream.bytes_stream().inspect_err(|err| {
        // Status and headers are already committed to the caller; a broken
        // relay can only be logged, never failed over.
        tracing::warn!(error = %err, "upstream body relay interrupted");
    }));

    let mut response = Response::new(body);
    *response.status_mut() = status;
    let headers = response.headers_mut();
    for (name, value) in &upstream_headers {
        if is_hop_by_hop(name) {
            continue;
        }
        headers.append(name, value.clone());
    }
    response
}

/// Hop-by-hop headers describe the upstream connection, not the payload, and
/// must not be echoed onto the caller's connection.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    name == CONNECTION || name == TRANSFER_ENCODING || name.as_str() == "keep-alive"
}
