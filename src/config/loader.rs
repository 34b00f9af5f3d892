//! Configuration loading from disk and the environment.
//!
//! Sources, later ones win:
//! 1. Compiled-in defaults
//! 2. TOML config file (optional)
//! 3. `TRACE_EDGE_*` environment variables
//!
//! An environment key is `TRACE_EDGE_<SECTION>_<FIELD>`, e.g.
//! `TRACE_EDGE_TRACE_REQUEST_ID_HEADER` sets `trace.request_id_header` and
//! `TRACE_EDGE_TIMEOUTS_REQUEST_SECS` sets `timeouts.request_secs`. Lists use
//! array syntax: `TRACE_EDGE_TRACE_SPAN_ID_HEADERS='["a", "b"]'`.
//!
//! Unknown keys and values of the wrong type are errors, not silently
//! ignored.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::http::downstream::DownstreamError;
use crate::trace::SpecError;

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "TRACE_EDGE_";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Trace header error: {0}")]
    Trace(#[from] SpecError),

    #[error("Downstream error: {0}")]
    Downstream(#[from] DownstreamError),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file, without environment overrides.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse configuration from TOML text without validating it.
pub fn parse_config(content: &str) -> Result<ServiceConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Load the effective configuration for the process.
///
/// Layers defaults, the file at `path` (if any) and `TRACE_EDGE_*`
/// environment variables, then validates the result. A `path` that does
/// not exist is an error.
pub fn load(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(ServiceConfig::default()));

    if let Some(path) = path {
        figment = figment.merge(Toml::string(&fs::read_to_string(path)?));
    }

    let config: ServiceConfig = figment.merge(env_provider()).extract().map_err(Box::new)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Environment provider for `TRACE_EDGE_*` keys.
///
/// Section names carry no underscore, so the first `_` after the prefix
/// separates section from field.
pub fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).map(|key| key.as_str().replacen('_', ".", 1).into())
}

/// Config paths set through the environment, e.g. `trace.request_id_header`.
pub fn env_overrides() -> Vec<String> {
    env_provider()
        .iter()
        .map(|(key, _)| key.as_str().to_ascii_lowercase())
        .collect()
}
