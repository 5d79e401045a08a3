//! Logging bootstrap and per-component log contexts
//!
//! The subscriber is installed once by the binary. Library components never
//! reach for a global logger of their own; each one is handed a [`LogContext`]
//! at construction and records its events inside that context's span.

use crate::config::LoggingConfig;
use crate::{Error, Result};
use tracing::Span;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install the global fmt subscriber
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::Config(format!("Invalid log level '{}': {}", config.level, e)))?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Logging(e.to_string()))
}

/// Span carrier passed explicitly into each component
#[derive(Debug, Clone)]
pub struct LogContext {
    span: Span,
}

impl LogContext {
    /// Root context for a service or job
    pub fn new(service: &'static str) -> Self {
        Self {
            span: tracing::info_span!("swm", service = service),
        }
    }

    /// Context that records nothing of its own (events still reach the subscriber)
    pub fn detached() -> Self {
        Self { span: Span::none() }
    }

    /// Child context for one component
    pub fn component(&self, name: &'static str) -> Self {
        Self {
            span: tracing::info_span!(parent: &self.span, "component", name = name),
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Default for LogContext {
    fn default() -> Self {
        Self::detached()
    }
}
