//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (trace context, tracing, timeout)
//! - Build the trace specs once from configuration
//! - Bind server to listener and drain on shutdown

use axum::{
    http::StatusCode,
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ConfigError, ServiceConfig};
use crate::http::downstream::DownstreamClient;
use crate::http::handlers::{forward_downstream, get_context, get_health, AppState};
use crate::http::middleware::TraceContextLayer;
use crate::trace::TraceSpecs;

/// HTTP server for the service.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
    specs: Arc<TraceSpecs>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServiceConfig) -> Result<Self, ConfigError> {
        let specs = TraceSpecs::from_config(&config.trace)?;
        Self::with_specs(config, specs)
    }

    /// Create a server with pre-built trace specs (e.g. a custom id generator).
    pub fn with_specs(config: ServiceConfig, specs: TraceSpecs) -> Result<Self, ConfigError> {
        let state = AppState {
            downstream: DownstreamClient::from_config(&config.downstream)?,
        };
        let specs = Arc::new(specs);

        let router = Self::build_router(&config, specs.clone(), state);
        Ok(Self {
            router,
            config,
            specs,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ServiceConfig, specs: Arc<TraceSpecs>, state: AppState) -> Router {
        Router::new()
            .route("/", get(get_context))
            .route("/health", get(get_health))
            .route("/downstream/{*path}", any(forward_downstream))
            .with_state(state)
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(config.timeouts.request_secs),
            ))
            .layer(TraceLayer::new_for_http())
            .layer(TraceContextLayer::new(specs))
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            response_header = %self.specs.response_header(),
            downstream = ?self.config.downstream.base_url,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn specs(&self) -> &Arc<TraceSpecs> {
        &self.specs
    }
}
