//! Axum extractor for the request's trace context.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::trace::TraceContext;

/// Rejection used when no [`TraceContextLayer`](crate::http::TraceContextLayer)
/// ran for the request.
#[derive(Debug, Clone, Copy)]
pub struct MissingTraceContext;

impl IntoResponse for MissingTraceContext {
    fn into_response(self) -> Response {
        tracing::error!("Trace context requested but the trace context layer is not installed");
        (StatusCode::INTERNAL_SERVER_ERROR, "trace context unavailable").into_response()
    }
}

impl<S> FromRequestParts<S> for TraceContext
where
    S: Send + Sync,
{
    type Rejection = MissingTraceContext;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TraceContext>()
            .cloned()
            .ok_or(MissingTraceContext)
    }
}
