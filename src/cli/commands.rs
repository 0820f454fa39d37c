//! CLI command implementations
//!
//! Boot order: load `.env`, parse arguments, initialise logging, prepare the
//! uploads directory, then serve until a shutdown signal arrives.

use tracing_subscriber::EnvFilter;

use crate::http_server::{GatewayConfig, HttpServer};

use super::args::Cli;
use super::errors::{CliError, CliResult};

/// Parse the environment and arguments, then run the server.
pub fn run() -> CliResult<()> {
    // A missing .env file is not an error.
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    init_logging();

    let config = cli.into_config()?;
    serve(config)
}

/// Install the global `tracing` subscriber, honouring `RUST_LOG` (default `info`).
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Fails only if a subscriber is already installed.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Start the HTTP gateway with the given configuration.
pub fn serve(config: GatewayConfig) -> CliResult<()> {
    if config.uses_default_api_key() {
        tracing::warn!("API_KEY is not set; using the built-in placeholder key");
    }

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        let server = HttpServer::open(config).await?;
        server
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))?;
        Ok::<(), CliError>(())
    })
}
