//! Trace identifier subsystem.
//!
//! # Data Flow
//! ```text
//! TraceConfig (once per process)
//!     → spec.rs (three IdentifierSpecs + response header name)
//!
//! Inbound HeaderMap (once per request)
//!     → resolver.rs (first matching candidate, or generate)
//!     → context.rs (TraceContext + onward headers)
//! ```
//!
//! # Design Decisions
//! - One resolver, parameterised by spec; trace, span and parent span differ
//!   only in `generate_on_miss` and `propagate`
//! - Candidate order comes from configuration, never from the wire
//! - Header names compare case-insensitively on both sides

pub mod context;
pub mod resolver;
pub mod spec;

pub use context::{OnwardHeaders, TraceContext};
pub use resolver::{resolve, IdGenerator, Resolution, UuidV4Generator};
pub use spec::{CandidateHeader, IdentifierKind, IdentifierSpec, SpecError, TraceSpecs};

/// Primary trace header, also written on every response.
pub const DEFAULT_REQUEST_ID_HEADER: &str = "DM-Request-ID";

/// Trace header used when forwarding to downstream services.
pub const DEFAULT_DOWNSTREAM_REQUEST_ID_HEADER: &str = "X-B3-TraceId";

/// Span id header.
pub const DEFAULT_SPAN_ID_HEADER: &str = "X-B3-SpanId";

/// Parent span id header.
// TODO: confirm against the deployed B3 convention (`X-B3-ParentSpanId`) before changing.
pub const DEFAULT_PARENT_SPAN_ID_HEADER: &str = "X-B3-ParentSpan";
