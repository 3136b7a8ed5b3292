use std::sync::Arc;

use axum::extract::State;
use axum::response::{Html, IntoResponse, Response};

use crate::state::AppState;

/// Page served when no HTML file exists at the configured path.
const STUB_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>proxy active</title>
<style>:root { font-family: sans-serif; background: #1e1e1e; color: #d4d4d4 }</style>
</head>
<body>
<h1>OpenAI-compatible proxy is running</h1>
<p>The proxy relays requests to several upstream APIs. Endpoints follow the
OpenAI API shape under <code>/api/v1/</code>:</p>
<ul>
<li><code>GET /api/v1/models</code></li>
<li><code>POST /api/v1/chat/completions</code></li>
</ul>
</body>
</html>
"#;

/// `GET /` — serves the configured static page, or the embedded stub when
/// the file is missing. Every other path 404s via the router fallback.
pub async fn handler(State(state): State<Arc<AppState>>) -> Response {
    match tokio::fs::read_to_string(&state.config.server.html_path).await {
        Ok(page) => Html(page).into_response(),
        Err(_) => Html(STUB_PAGE).into_response(),
    }
}
