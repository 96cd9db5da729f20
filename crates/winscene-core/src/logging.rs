//! Structured logging for winscene
//!
//! One `tracing` subscriber writes pretty or JSON lines to stderr. Each
//! session worker runs inside a `session` span, so every event it emits
//! carries these correlation fields:
//! - `session_id`: Session identifier
//! - `category`: Window category of the session
//! - `window_type`: Concrete window type

pub use crate::config::LogFormat;
use serde::{Deserialize, Serialize};
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::category::WindowCategory;
use crate::property::WindowType;
use crate::session::SessionId;

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive, overridden by `RUST_LOG`
    pub level: String,

    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Error type for logging initialization
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("logging already initialized")]
    AlreadyInitialized,

    #[error("invalid log filter {directive:?}: {reason}")]
    InvalidFilter { directive: String, reason: String },
}

/// Parse a filter directive such as `info` or `winscene_core=debug`.
pub fn parse_filter(directive: &str) -> Result<EnvFilter, LogError> {
    EnvFilter::try_new(directive).map_err(|err| LogError::InvalidFilter {
        directive: directive.to_string(),
        reason: err.to_string(),
    })
}

fn format_layer<S, W>(format: LogFormat, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer().with_writer(writer).with_target(true).boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .flatten_event(true)
            .boxed(),
    }
}

/// Install the global subscriber.
///
/// The configured directive is validated even when `RUST_LOG` is set and
/// takes precedence. A second call returns [`LogError::AlreadyInitialized`].
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    let configured = parse_filter(&config.level)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or(configured);

    tracing_subscriber::registry()
        .with(filter)
        .with(format_layer(config.format, std::io::stderr))
        .try_init()
        .map_err(|_| LogError::AlreadyInitialized)?;

    tracing::debug!(log_level = %config.level, log_format = %config.format, "logging initialized");
    Ok(())
}

/// Span wrapping a session worker for its whole life.
pub fn session_span(id: SessionId, category: WindowCategory, window_type: WindowType) -> tracing::Span {
    tracing::info_span!(
        "session",
        session_id = %id,
        category = %category,
        window_type = ?window_type,
    )
}
