use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber.
///
/// Quiet mode installs no subscriber at all, which suppresses startup and
/// request logging. Otherwise the filter comes from `RUST_LOG`, defaulting
/// to `info`.
pub fn init_tracing(quiet: bool) {
    if quiet {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Log every inbound request before handing it to the router.
pub async fn log_requests(request: Request, next: Next) -> Response {
    tracing::info!(
        method = %request.method(),
        path = %request.uri().path(),
        "request received"
    );
    next.run(request).await
}
