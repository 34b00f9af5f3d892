//! Calls to downstream services.
//!
//! # Responsibilities
//! - Rewrite a relative request onto the configured downstream base URL
//! - Attach the request's onward trace headers
//! - Bound every call with a timeout
//!
//! # Design Decisions
//! - Onward headers replace any same-named header already on the request
//! - Parent span headers are never attached (they are not onward headers)
//! - Plain HTTP only; the connector does not do TLS

use axum::body::Body;
use axum::http::uri::{InvalidUri, Scheme};
use axum::http::{Request, Response, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::time::Duration;
use thiserror::Error;

use crate::config::DownstreamConfig;
use crate::trace::TraceContext;

/// Error type for downstream calls.
#[derive(Debug, Error)]
pub enum DownstreamError {
    #[error("invalid downstream URI: {0}")]
    InvalidUri(#[from] InvalidUri),

    #[error("downstream URL '{0}' must use http://")]
    UnsupportedScheme(String),

    #[error("downstream URL '{0}' has no host")]
    MissingAuthority(String),

    #[error("failed to build downstream request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("downstream request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("downstream request timed out after {0:?}")]
    Timeout(Duration),
}

/// Check `url` and return it without a trailing slash.
pub fn parse_base_url(url: &str) -> Result<String, DownstreamError> {
    let uri: Uri = url.parse()?;
    if uri.scheme() != Some(&Scheme::HTTP) {
        return Err(DownstreamError::UnsupportedScheme(url.to_string()));
    }
    if uri.authority().is_none() {
        return Err(DownstreamError::MissingAuthority(url.to_string()));
    }
    Ok(url.trim_end_matches('/').to_string())
}

/// HTTP client for one downstream service.
#[derive(Clone)]
pub struct DownstreamClient {
    client: Client<HttpConnector, Body>,
    base_url: String,
    timeout: Duration,
}

impl DownstreamClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DownstreamError> {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
            timeout,
        })
    }

    /// Build a client from config; `None` when no downstream is configured.
    pub fn from_config(config: &DownstreamConfig) -> Result<Option<Self>, DownstreamError> {
        config
            .base_url
            .as_deref()
            .map(|url| Self::new(url, Duration::from_secs(config.timeout_secs)))
            .transpose()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URI for `path_and_query` on this downstream.
    pub fn target(&self, path_and_query: &str) -> Result<Uri, DownstreamError> {
        let uri = if path_and_query.starts_with('/') {
            format!("{}{}", self.base_url, path_and_query)
        } else {
            format!("{}/{}", self.base_url, path_and_query)
        };
        Ok(uri.parse()?)
    }

    /// Send `request` downstream with `ctx`'s onward headers.
    ///
    /// Only the path and query of `request.uri()` are used.
    pub async fn forward(
        &self,
        ctx: &TraceContext,
        request: Request<Body>,
    ) -> Result<Response<Body>, DownstreamError> {
        let (mut parts, body) = request.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        parts.uri = self.target(path_and_query)?;
        ctx.onward_headers().apply_to(&mut parts.headers);

        tracing::debug!(
            method = %parts.method,
            uri = %parts.uri,
            onward_headers = ctx.onward_headers().len(),
            "Forwarding request downstream"
        );

        let request = Request::from_parts(parts, body);
        let response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| DownstreamError::Timeout(self.timeout))??;

        let (parts, body) = response.into_parts();
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}
