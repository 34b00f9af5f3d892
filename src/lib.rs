//! Request trace-context resolution and propagation for HTTP services.
//!
//! Every inbound request gets a trace id (taken from the first configured
//! header that carries one, or freshly generated), an optional span id and
//! an optional parent span id. Handlers read them through [`TraceContext`];
//! calls to downstream services carry [`TraceContext::onward_headers`];
//! every response, including failed ones, echoes the trace id back.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod trace;

pub use config::schema::ServiceConfig;
pub use http::{HttpServer, TraceContextLayer};
pub use lifecycle::Shutdown;
pub use trace::{TraceContext, TraceSpecs};
