//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::trace::{DEFAULT_PARENT_SPAN_ID_HEADER, DEFAULT_REQUEST_ID_HEADER, DEFAULT_SPAN_ID_HEADER};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Trace header names and propagation.
    pub trace: TraceConfig,

    /// Downstream service that `/downstream/*` forwards to.
    pub downstream: DownstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Trace header configuration.
///
/// Header names are matched case-insensitively. Candidate lists are checked
/// in the order given here, not the order headers arrive in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceConfig {
    /// Primary trace header. Also the header echoed on every response.
    /// Empty falls back to `DM-Request-ID`.
    pub request_id_header: String,

    /// Trace header used towards downstream services.
    /// Unset or empty falls back to `X-B3-TraceId`.
    pub downstream_request_id_header: Option<String>,

    /// Replaces the primary/downstream pair for matching and propagation.
    pub trace_id_headers: Option<Vec<String>>,

    /// Span id candidates.
    pub span_id_headers: Vec<String>,

    /// Parent span id candidates. Resolved but never forwarded.
    pub parent_span_id_headers: Vec<String>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            request_id_header: DEFAULT_REQUEST_ID_HEADER.to_string(),
            downstream_request_id_header: None,
            trace_id_headers: None,
            span_id_headers: vec![DEFAULT_SPAN_ID_HEADER.to_string()],
            parent_span_id_headers: vec![DEFAULT_PARENT_SPAN_ID_HEADER.to_string()],
        }
    }
}

/// Downstream service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownstreamConfig {
    /// Base URL (e.g., "http://127.0.0.1:9000"). Forwarding is off when unset.
    pub base_url: Option<String>,

    /// Downstream request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, for development.
    #[default]
    Pretty,
    /// One JSON object per line, for log aggregation.
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
