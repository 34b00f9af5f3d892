//! Trace context middleware.
//!
//! Resolves the request's [`TraceContext`] before the inner service runs and
//! writes the trace id onto whatever response comes back, including the
//! `500` produced when the inner service panics.
//!
//! Per request the middleware moves through three states:
//!
//! ```text
//! RESOLVING  call(): headers → TraceContext, inserted into extensions
//!     → BOUND      future holds a ResponseBinding, inner service running
//!     → FINALIZED  binding consumed, header written, response returned
//! ```
//!
//! Install it as the outermost layer so no other layer can emit a response
//! around it.

use axum::body::{Body, Bytes, HttpBody};
use axum::http::{header, HeaderName, HeaderValue, Request, Response, StatusCode};
use axum::BoxError;
use pin_project::pin_project;
use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tower_http::catch_panic::{CatchPanic, CatchPanicLayer};
use tracing::Span;

use crate::observability::metrics;
use crate::trace::{TraceContext, TraceSpecs};

type PanicHandler = fn(Box<dyn Any + Send + 'static>) -> Response<Body>;

/// Layer that applies [`TraceContextService`].
#[derive(Debug, Clone)]
pub struct TraceContextLayer {
    specs: Arc<TraceSpecs>,
}

impl TraceContextLayer {
    pub fn new(specs: Arc<TraceSpecs>) -> Self {
        Self { specs }
    }
}

impl<S> Layer<S> for TraceContextLayer {
    type Service = TraceContextService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TraceContextService {
            inner: CatchPanicLayer::custom(panic_response as PanicHandler).layer(inner),
            specs: self.specs.clone(),
        }
    }
}

/// Resolves trace identifiers and echoes the trace id on every response.
///
/// Panics in the inner service become `500` responses before the trace id
/// is written.
#[derive(Debug, Clone)]
pub struct TraceContextService<S> {
    inner: CatchPanic<S, PanicHandler>,
    specs: Arc<TraceSpecs>,
}

impl<S, ReqBody> Service<Request<ReqBody>> for TraceContextService<S>
where
    S: Service<Request<ReqBody>, Response = Response<Body>>,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = TraceContextFuture<<CatchPanic<S, PanicHandler> as Service<Request<ReqBody>>>::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let ctx = self.specs.resolve(request.headers());
        metrics::record_context(&ctx);

        let span = tracing::info_span!(
            "request",
            trace_id = %ctx.trace_id(),
            span_id = ctx.span_id(),
            parent_span_id = ctx.parent_span_id(),
        );
        if ctx.trace_id_generated() {
            tracing::debug!(parent: &span, "No inbound trace header, generated trace id");
        }

        let binding = ResponseBinding::bind(self.specs.response_header().clone(), &ctx);
        request.extensions_mut().insert(ctx);

        let future = {
            let _guard = span.enter();
            self.inner.call(request)
        };

        TraceContextFuture {
            future,
            span,
            binding: Some(binding),
        }
    }
}

/// Response future for [`TraceContextService`].
#[pin_project]
pub struct TraceContextFuture<F> {
    #[pin]
    future: F,
    span: Span,
    binding: Option<ResponseBinding>,
}

impl<F, B, E> Future for TraceContextFuture<F>
where
    F: Future<Output = Result<Response<B>, E>>,
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    type Output = Result<Response<Body>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _guard = this.span.enter();

        let result = match this.future.poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(result) => result,
        };

        Poll::Ready(result.map(|response| {
            let mut response = response.map(Body::new);
            if let Some(binding) = this.binding.take() {
                binding.finalize(&mut response);
            }
            response
        }))
    }
}

/// The trace id bound to a request, waiting to be written on its response.
#[derive(Debug)]
struct ResponseBinding {
    header: HeaderName,
    value: Option<HeaderValue>,
}

impl ResponseBinding {
    fn bind(header: HeaderName, ctx: &TraceContext) -> Self {
        let value = match HeaderValue::from_str(ctx.trace_id()) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(header = %header, "Trace id is not a valid header value, response will not carry it");
                None
            }
        };
        Self { header, value }
    }

    /// Consumes the binding; any value already set by the handler is replaced.
    fn finalize(self, response: &mut Response<Body>) {
        if let Some(value) = self.value {
            response.headers_mut().insert(self.header, value);
        }
        tracing::debug!(status = %response.status(), "Response finalized");
    }
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %message, "Request handler panicked");

    let mut response = Response::new(Body::from("Internal Server Error"));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
