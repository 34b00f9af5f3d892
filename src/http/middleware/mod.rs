//! Tower middleware.
//!
//! # Layer Order (outermost first)
//! ```text
//! trace_context.rs (resolve ids, echo trace id on every response)
//!     → tower_http TraceLayer (request/response events)
//!     → tower_http TimeoutLayer
//!     → handlers
//! ```

pub mod trace_context;

pub use trace_context::{TraceContextFuture, TraceContextLayer, TraceContextService};
