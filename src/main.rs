//! portfolio-pulse
//!
//! Serves the observability endpoints of the portfolio service.
//!
//! ```text
//!   request ──▶ TraceLayer ──▶ trace_middleware ──▶ timeout ──▶ handler
//!                                  │
//!                                  ├──▶ TraceHub ──▶ /api/traces/stream
//!                                  └──▶ AggregationPort::ingest (detached)
//!
//!   1 Hz ──▶ TelemetrySampler ──▶ TelemetryFeed ──▶ ChaosOverlay ──▶ /api/telemetry/stream
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use portfolio_pulse::config::load_or_default;
use portfolio_pulse::lifecycle::signals::spawn_signal_listener;
use portfolio_pulse::observability::{logging, metrics};
use portfolio_pulse::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "portfolio-pulse", version, about = "Portfolio observability service")]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_or_default(args.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "portfolio-pulse starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        aggregation = config.aggregation.enabled,
        database = %config.database.path,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.admin.api_key.is_empty() {
        tracing::warn!("admin.api_key is not set; admin endpoints are disabled");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    spawn_signal_listener(&shutdown);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config, &shutdown)?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
