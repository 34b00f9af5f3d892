//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every configured header name parses and every list is non-empty
//! - Validate value ranges (timeouts > 0) and addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::HeaderName;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::http::downstream::parse_base_url;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid listener.bind_address '{0}'")]
    BindAddress(String),

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("{field} must list at least one header")]
    EmptyHeaderList { field: &'static str },

    #[error("{field} contains invalid header name '{name}'")]
    InvalidHeaderName { field: &'static str, name: String },

    #[error("invalid downstream.base_url '{0}'")]
    DownstreamUrl(String),

    #[error("downstream.timeout_secs must be greater than zero")]
    ZeroDownstreamTimeout,

    #[error("invalid observability.metrics_address '{0}'")]
    MetricsAddress(String),
}

/// Validate `config`, collecting every error found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    let trace = &config.trace;
    // Empty single headers fall back to their defaults.
    check_optional_header(&mut errors, "trace.request_id_header", &trace.request_id_header);
    if let Some(downstream) = &trace.downstream_request_id_header {
        check_optional_header(&mut errors, "trace.downstream_request_id_header", downstream);
    }
    if let Some(overrides) = &trace.trace_id_headers {
        check_header_list(&mut errors, "trace.trace_id_headers", overrides);
    }
    check_header_list(&mut errors, "trace.span_id_headers", &trace.span_id_headers);
    check_header_list(&mut errors, "trace.parent_span_id_headers", &trace.parent_span_id_headers);

    if let Some(url) = &config.downstream.base_url {
        if parse_base_url(url).is_err() {
            errors.push(ValidationError::DownstreamUrl(url.clone()));
        }
    }
    if config.downstream.timeout_secs == 0 {
        errors.push(ValidationError::ZeroDownstreamTimeout);
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_optional_header(errors: &mut Vec<ValidationError>, field: &'static str, name: &str) {
    if !name.is_empty() && HeaderName::from_bytes(name.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidHeaderName {
            field,
            name: name.to_string(),
        });
    }
}

fn check_header_list(errors: &mut Vec<ValidationError>, field: &'static str, names: &[String]) {
    if names.is_empty() {
        errors.push(ValidationError::EmptyHeaderList { field });
    }
    for name in names {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeaderName {
                field,
                name: name.clone(),
            });
        }
    }
}
