//! voice-sql server binary.
//!
//! Loads configuration, builds the configured inference backend once and
//! serves the HTTP API until the process is stopped.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use voice_sql::config::{Cli, Config};
use voice_sql::inference::build_backend;
use voice_sql::metrics::Metrics;
use voice_sql::server::api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "voice_sql=debug,tower_http=debug"
    } else {
        "voice_sql=info,tower_http=info"
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter.into());
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }

    info!("voice-sql v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let config = Config::load(&cli.config)?.apply_cli(&cli);

    info!(
        profile = %config.profile,
        strategy = %config.strategy(),
        model = config.model_id(),
        "Configuration loaded"
    );

    // Build the inference backend. Local model load failures end the process here.
    let backend = build_backend(&config)?;

    let metrics = Metrics::new()?;
    let state = Arc::new(AppState::new(backend, config.prompt_style(), metrics));

    // Build the HTTP router.
    let app = build_router(state, config.server.cors);

    // Start the server.
    let listen_addr = config.server.listen_addr();
    info!(addr = listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
