//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup)
//!     → middleware/trace_context.rs (resolve ids, bind TraceContext)
//!     → handlers.rs (read TraceContext via extract.rs)
//!     → downstream.rs (outbound calls carry onward headers)
//!     → middleware/trace_context.rs (trace id header on the response)
//!     → Send to client
//! ```

pub mod downstream;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod server;

pub use downstream::{DownstreamClient, DownstreamError};
pub use extract::MissingTraceContext;
pub use middleware::TraceContextLayer;
pub use server::HttpServer;
