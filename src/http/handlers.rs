//! Request handlers.

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::http::downstream::{DownstreamClient, DownstreamError};
use crate::trace::TraceContext;

/// Application state injected into handlers.
#[derive(Clone, Default)]
pub struct AppState {
    pub downstream: Option<DownstreamClient>,
}

/// Handler failures, rendered as plain-text error responses.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("no downstream service configured")]
    DownstreamNotConfigured,

    #[error(transparent)]
    Downstream(#[from] DownstreamError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::DownstreamNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Downstream(DownstreamError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Downstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::warn!(status = %status, error = %self, "Request failed");
        (status, self.to_string()).into_response()
    }
}

/// Echo the resolved trace context.
pub async fn get_context(ctx: TraceContext) -> Json<TraceContext> {
    Json(ctx)
}

pub async fn get_health() -> &'static str {
    "ok"
}

/// Forward `/downstream/{path}` to the configured downstream service.
///
/// Method, query, body, `Content-Type` and `Accept` are carried over; trace
/// lineage travels in the onward headers only.
pub async fn forward_downstream(
    State(state): State<AppState>,
    ctx: TraceContext,
    Path(path): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    let client = state
        .downstream
        .as_ref()
        .ok_or(AppError::DownstreamNotConfigured)?;

    let (parts, body) = request.into_parts();
    let path_and_query = match parts.uri.query() {
        Some(query) => format!("/{path}?{query}"),
        None => format!("/{path}"),
    };

    let mut builder = axum::http::Request::builder().method(parts.method).uri(path_and_query);
    for name in [header::CONTENT_TYPE, header::ACCEPT] {
        if let Some(value) = parts.headers.get(&name) {
            builder = builder.header(name, value.clone());
        }
    }
    let outbound = builder.body(body).map_err(DownstreamError::from)?;

    let response = client.forward(&ctx, outbound).await?;
    tracing::info!(status = %response.status(), "Downstream responded");
    Ok(response)
}
