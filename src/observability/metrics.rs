//! Metrics collection and exposition.
//!
//! # Metrics
//! - `trace_edge_identifiers_total` (counter): identifiers resolved, by
//!   `kind` (trace, span, parent_span) and `outcome` (header, generated, absent)

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

use crate::trace::{IdentifierKind, TraceContext};

pub const IDENTIFIERS_TOTAL: &str = "trace_edge_identifiers_total";

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record how each identifier of `ctx` was obtained.
pub fn record_context(ctx: &TraceContext) {
    let trace = if ctx.trace_id_generated() { "generated" } else { "header" };
    record(IdentifierKind::Trace, trace);
    record(IdentifierKind::Span, presence(ctx.span_id()));
    record(IdentifierKind::ParentSpan, presence(ctx.parent_span_id()));
}

fn presence(value: Option<&str>) -> &'static str {
    if value.is_some() {
        "header"
    } else {
        "absent"
    }
}

fn record(kind: IdentifierKind, outcome: &'static str) {
    metrics::counter!(IDENTIFIERS_TOTAL, "kind" => kind.as_str(), "outcome" => outcome).increment(1);
}
