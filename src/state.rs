use std::time::Duration;

use crate::config::AppConfig;
use crate::routing::EndpointResolver;

/// Shared application state accessible to all handlers. Everything in here
/// is read-only after startup.
pub struct AppState {
    pub config: AppConfig,
    pub resolver: EndpointResolver,
    pub client: reqwest::Client,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        let resolver = EndpointResolver::new(&config.routing);
        Self {
            config,
            resolver,
            client: build_http_client(),
        }
    }
}

/// One pooled client for all upstream calls. No overall request timeout is
/// set: an in-flight call lives until the upstream answers or the caller
/// disconnects and cancels it.
fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .tcp_nodelay(true)
        .connect_timeout(Duration::from_secs(5))
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap_or_else(|err| {
            tracing::error!(error = %err, "failed to build configured HTTP client, falling back to defaults");
            reqwest::Client::new()
        })
}
