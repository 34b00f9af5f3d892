//! trace-edge service.
//!
//! ```text
//!     Client Request ──▶ TraceContextLayer ──▶ TraceLayer ──▶ Timeout ──▶ handlers ──▶ downstream
//!          (trace id header)    │ resolve trace / span / parent span            (onward headers)
//!     Client Response ◀─────────┘ echo trace id, also on 500 and panics
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

use trace_edge::config;
use trace_edge::http::HttpServer;
use trace_edge::lifecycle::{signals, Shutdown};
use trace_edge::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "trace-edge")]
#[command(about = "HTTP service resolving and propagating request trace context", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = config::load(args.config.as_deref())?;

    logging::init_logging(&config.observability)?;

    tracing::info!("trace-edge v{} starting", env!("CARGO_PKG_VERSION"));
    for key in config::loader::env_overrides() {
        tracing::info!(key = %key, "Configuration overridden from environment");
    }
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_id_header = %config.trace.request_id_header,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let server = HttpServer::new(config)?;
    let listener = TcpListener::bind(&server.config().listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_handler(shutdown);

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
