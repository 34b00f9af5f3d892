//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, request span carries trace_id)
//!     → metrics.rs (identifier resolution counters)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Trace id flows through every log line of a request via the request span
//! - Metrics are cheap (atomic increments) and off by default

pub mod logging;
pub mod metrics;
