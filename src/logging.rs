// Structured Logging
// Operator-facing output is tracing records; poll cycles summarize drops,
// skips and flags at info.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ConfigSection;
use crate::error::{ConfluenceError, ConfluenceResult};

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty, compact)
    pub format: String,
    /// Environment filter override; takes precedence over `level` when set
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            env_filter: None,
        }
    }
}

impl ConfigSection for LoggingConfig {
    const KEY: &'static str = "logging";

    fn validate(&self) -> ConfluenceResult<()> {
        match self.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfluenceError::invalid_config_value(
                    "logging.level",
                    other,
                ))
            }
        }
        match self.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => Ok(()),
            other => Err(ConfluenceError::invalid_config_value(
                "logging.format",
                other,
            )),
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Idempotence is the caller's problem; this is called exactly once from
/// `main` before any component starts.
pub fn init_logging(config: &LoggingConfig) -> ConfluenceResult<()> {
    let filter = match &config.env_filter {
        Some(custom) => EnvFilter::try_new(custom)
            .map_err(|e| ConfluenceError::configuration(format!("invalid env_filter: {e}")))?,
        None => EnvFilter::try_new(format!("confluence={},warn", config.level))
            .map_err(|e| ConfluenceError::configuration(format!("invalid log level: {e}")))?,
    };

    let registry = tracing_subscriber::registry().with(filter);

    match config.format.to_lowercase().as_str() {
        "json" => registry
            .with(fmt::layer().json().with_target(true))
            .try_init(),
        "pretty" => registry.with(fmt::layer().pretty()).try_init(),
        _ => registry.with(fmt::layer().compact()).try_init(),
    }
    .map_err(|e| ConfluenceError::configuration(format!("failed to init logging: {e}")))?;

    Ok(())
}
