pub mod chat;
pub mod models;
pub mod root;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::observability::log_requests;
use crate::state::AppState;

/// Build the full application router. Known paths with the wrong method get
/// a 405 from axum's method routing; unknown paths get a 404.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/models", get(models::handler))
        .route("/api/v1/chat/completions", post(chat::handler))
        .route("/", get(root::handler))
        .layer(axum::middleware::from_fn(log_requests))
        .with_state(state)
}
