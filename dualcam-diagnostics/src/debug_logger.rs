//! Structured debug logging system

use dualcam_core::DualCamError;
use tracing_subscriber::EnvFilter;

/// Filter used when the caller provides none
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Debug logger for structured logging
#[derive(Debug, Clone)]
pub struct DebugLogger {
    filter: String,
}

impl DebugLogger {
    /// Create a logger with the given filter directives
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
        }
    }

    /// Configured filter directives
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Install this logger as the global subscriber
    pub fn install(&self) -> Result<(), DualCamError> {
        Self::init_logging(&self.filter)
    }

    /// Initialize logging system
    ///
    /// Fails on malformed filter directives or if a global subscriber is
    /// already installed.
    pub fn init_logging(filter: &str) -> Result<(), DualCamError> {
        tracing_subscriber::fmt()
            .with_env_filter(parse_filter(filter)?)
            .with_target(true)
            .try_init()
            .map_err(|e| DualCamError::Initialization {
                reason: format!("logging already initialized: {}", e),
            })
    }
}

impl Default for DebugLogger {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_FILTER)
    }
}

fn parse_filter(filter: &str) -> Result<EnvFilter, DualCamError> {
    EnvFilter::try_new(filter).map_err(|e| DualCamError::config("log_filter", e.to_string()))
}
