use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use chat_relay::api::build_router;
use chat_relay::config::{load_routing, AppConfig, ServerConfig};
use chat_relay::observability::init_tracing;
use chat_relay::state::AppState;

/// OpenAI-compatible chat proxy with image-aware routing and sequential
/// upstream failover.
#[derive(Debug, Parser)]
#[command(name = "chat-relay", version)]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 7860)]
    port: u16,
    /// Suppress startup and request logging.
    #[arg(long)]
    quiet: bool,
    /// Path to a static page served on the root path.
    #[arg(long, default_value = "index.html")]
    html: PathBuf,
    /// Optional YAML file replacing the built-in routing tables.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let routing = load_routing(args.config.as_deref()).unwrap_or_else(|err| {
        eprintln!("Failed to load routing configuration: {err}");
        std::process::exit(1);
    });

    let config = AppConfig {
        server: ServerConfig {
            port: args.port,
            quiet: args.quiet,
            html_path: args.html,
        },
        routing,
    };

    init_tracing(config.server.quiet);

    let addr = format!("0.0.0.0:{}", config.server.port);
    let state = Arc::new(AppState::new(config));
    let router = build_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap_or_else(|err| {
        eprintln!("Failed to bind to {addr}: {err}");
        std::process::exit(1);
    });

    tracing::info!("chat-relay listening on http://{addr}");

    if let Err(err) = axum::serve(listener, router).await {
        eprintln!("Server error: {err}");
        std::process::exit(1);
    }
}
