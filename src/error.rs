use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// Canonical error type used across all modules.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Malformed request body: {0}")]
    MalformedBody(String),
    #[error("Invalid message content: {0}")]
    InvalidContent(String),
    #[error("Unsupported message content type: {0}")]
    UnsupportedContentType(String),
    #[error("No endpoints configured for model '{model}' (images={has_images})")]
    NoRoute { model: String, has_images: bool },
    #[error("Request to {url} failed: {message}")]
    UpstreamAttempt { url: String, message: String },
    #[error("All upstream endpoints failed, last error: {last}")]
    AllCandidatesExhausted { last: String },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    #[must_use]
    pub fn status(&self) -> http::StatusCode {
        match self {
            ProxyError::MalformedBody(_)
            | ProxyError::InvalidContent(_)
            | ProxyError::UnsupportedContentType(_)
            | ProxyError::NoRoute { .. } => http::StatusCode::BAD_REQUEST,
            // A lone attempt error never reaches the caller directly, but if
            // it ever does it is still an upstream fault.
            ProxyError::UpstreamAttempt { .. } | ProxyError::AllCandidatesExhausted { .. } => {
                http::StatusCode::BAD_GATEWAY
            }
            ProxyError::Internal(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ProxyError::MalformedBody(_)
            | ProxyError::InvalidContent(_)
            | ProxyError::UnsupportedContentType(_)
            | ProxyError::NoRoute { .. } => "invalid_request_error",
            ProxyError::UpstreamAttempt { .. } | ProxyError::AllCandidatesExhausted { .. } => {
                "upstream_error"
            }
            ProxyError::Internal(_) => "internal_error",
        }
    }
}

/// Errors are rendered as an OpenAI-style `{"error": {...}}` JSON payload.
impl IntoResponse for ProxyError {
    fn into_response(self) -> axum::response::Response {
        let body = json!({
            "error": {
                "message": self.to_string(),
                "type": self.kind(),
            }
        });
        (self.status(), Json(body)).into_response()
    }
}
