//! Identifier specs, built once from configuration.
//!
//! # Responsibilities
//! - Turn the `[trace]` config table into three [`IdentifierSpec`]s
//! - Parse candidate header names up front so requests never see a bad name
//! - Pick the response header name
//!
//! # Design Decisions
//! - An override list replaces the primary/downstream pair entirely
//! - An empty or unset downstream header falls back to the well-known default
//! - The response header is always the primary header, even under an override list

use axum::http::{header::InvalidHeaderName, HeaderMap, HeaderName};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::config::schema::TraceConfig;
use crate::trace::context::TraceContext;
use crate::trace::resolver::{IdGenerator, UuidV4Generator};
use crate::trace::{DEFAULT_DOWNSTREAM_REQUEST_ID_HEADER, DEFAULT_REQUEST_ID_HEADER};

/// The three identifier kinds carried by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Trace,
    Span,
    ParentSpan,
}

impl IdentifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierKind::Trace => "trace",
            IdentifierKind::Span => "span",
            IdentifierKind::ParentSpan => "parent_span",
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error building identifier specs from configuration.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("{kind} header list is empty")]
    EmptyCandidates { kind: IdentifierKind },

    #[error("invalid {kind} header name '{name}': {source}")]
    InvalidHeaderName {
        kind: IdentifierKind,
        name: String,
        #[source]
        source: InvalidHeaderName,
    },
}

/// A candidate header: the configured spelling plus its parsed name.
///
/// The configured spelling is what onward headers are keyed by; matching
/// uses the parsed (lowercase) name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateHeader {
    name: String,
    header: HeaderName,
}

impl CandidateHeader {
    pub fn parse(name: &str) -> Result<Self, InvalidHeaderName> {
        Ok(Self {
            name: name.to_owned(),
            header: HeaderName::from_bytes(name.as_bytes())?,
        })
    }

    /// Header name as configured.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Header name used for case-insensitive matching.
    pub fn header_name(&self) -> &HeaderName {
        &self.header
    }
}

/// Resolution policy for one identifier kind.
#[derive(Debug, Clone)]
pub struct IdentifierSpec {
    kind: IdentifierKind,
    candidates: Vec<CandidateHeader>,
    generate_on_miss: bool,
    propagate: bool,
}

impl IdentifierSpec {
    /// Build a spec. The candidate list must not be empty.
    pub fn new<I, N>(
        kind: IdentifierKind,
        names: I,
        generate_on_miss: bool,
        propagate: bool,
    ) -> Result<Self, SpecError>
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        let candidates = names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                CandidateHeader::parse(name).map_err(|source| SpecError::InvalidHeaderName {
                    kind,
                    name: name.to_owned(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if candidates.is_empty() {
            return Err(SpecError::EmptyCandidates { kind });
        }

        Ok(Self {
            kind,
            candidates,
            generate_on_miss,
            propagate,
        })
    }

    /// Trace ids are generated on miss and forwarded.
    pub fn trace<I, N>(names: I) -> Result<Self, SpecError>
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        Self::new(IdentifierKind::Trace, names, true, true)
    }

    /// Span ids are never generated but are forwarded when present.
    pub fn span<I, N>(names: I) -> Result<Self, SpecError>
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        Self::new(IdentifierKind::Span, names, false, true)
    }

    /// Parent span ids are never generated and never forwarded.
    pub fn parent_span<I, N>(names: I) -> Result<Self, SpecError>
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        Self::new(IdentifierKind::ParentSpan, names, false, false)
    }

    pub fn kind(&self) -> IdentifierKind {
        self.kind
    }

    pub fn candidates(&self) -> &[CandidateHeader] {
        &self.candidates
    }

    pub fn generate_on_miss(&self) -> bool {
        self.generate_on_miss
    }

    pub fn propagate(&self) -> bool {
        self.propagate
    }
}

/// Everything the middleware needs to resolve and echo identifiers.
#[derive(Debug, Clone)]
pub struct TraceSpecs {
    trace: IdentifierSpec,
    span: IdentifierSpec,
    parent_span: IdentifierSpec,
    response_header: HeaderName,
    generator: Arc<dyn IdGenerator>,
}

impl TraceSpecs {
    /// Build the specs from the `[trace]` config table.
    pub fn from_config(config: &TraceConfig) -> Result<Self, SpecError> {
        let primary = non_empty(&config.request_id_header).unwrap_or(DEFAULT_REQUEST_ID_HEADER);

        let trace = match &config.trace_id_headers {
            Some(overrides) => IdentifierSpec::trace(overrides)?,
            None => {
                let downstream = config
                    .downstream_request_id_header
                    .as_deref()
                    .and_then(non_empty)
                    .unwrap_or(DEFAULT_DOWNSTREAM_REQUEST_ID_HEADER);
                IdentifierSpec::trace([primary, downstream])?
            }
        };

        let response_header = CandidateHeader::parse(primary)
            .map_err(|source| SpecError::InvalidHeaderName {
                kind: IdentifierKind::Trace,
                name: primary.to_owned(),
                source,
            })?
            .header;

        Ok(Self {
            trace,
            span: IdentifierSpec::span(&config.span_id_headers)?,
            parent_span: IdentifierSpec::parent_span(&config.parent_span_id_headers)?,
            response_header,
            generator: Arc::new(UuidV4Generator),
        })
    }

    /// Replace the identifier generator.
    pub fn with_generator(mut self, generator: impl IdGenerator + 'static) -> Self {
        self.generator = Arc::new(generator);
        self
    }

    /// Resolve all three identifiers for one request.
    pub fn resolve(&self, headers: &HeaderMap) -> TraceContext {
        TraceContext::resolve(headers, self)
    }

    pub fn trace(&self) -> &IdentifierSpec {
        &self.trace
    }

    pub fn span(&self) -> &IdentifierSpec {
        &self.span
    }

    pub fn parent_span(&self) -> &IdentifierSpec {
        &self.parent_span
    }

    /// Header written on every response, carrying the trace id.
    pub fn response_header(&self) -> &HeaderName {
        &self.response_header
    }

    pub fn generator(&self) -> &dyn IdGenerator {
        self.generator.as_ref()
    }
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value).filter(|v| !v.is_empty())
}
