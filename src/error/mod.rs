// Error Types
// Typed outcomes for every subsystem; errors never cross the poller boundary
// as panics.

use thiserror::Error;
use tracing::Level;

/// Crate-wide result alias.
pub type ConfluenceResult<T> = std::result::Result<T, ConfluenceError>;

/// Error taxonomy for the aggregator.
///
/// Variants map onto the recovery policy: transient network and decode
/// failures count toward adapter health and are retried on the next cadence;
/// configuration errors are startup-fatal; sink failures are logged and
/// superseded by the next tick.
#[derive(Error, Debug, Clone)]
pub enum ConfluenceError {
    // Exchange I/O
    #[error("Exchange request failed: {exchange}: {message}")]
    ExchangeRequest { exchange: String, message: String },

    #[error("Exchange returned status {status}: {exchange}: {body}")]
    ExchangeStatus {
        exchange: String,
        status: u16,
        body: String,
    },

    #[error("Response decode failed: {exchange}: {message}")]
    ResponseDecode { exchange: String, message: String },

    #[error("Request deadline exceeded: {exchange} after {deadline_ms}ms")]
    Deadline { exchange: String, deadline_ms: u64 },

    // Symbol resolution
    #[error("Symbol unresolved: {exchange}/{symbol}")]
    SymbolUnresolved { exchange: String, symbol: String },

    // Database
    #[error("Database connection failed: {message}")]
    DatabaseConnection { message: String },

    #[error("Database query failed: {message}")]
    DatabaseQuery { message: String },

    #[error("Sink write failed: {sink}: {message}")]
    SinkWrite { sink: String, message: String },

    // Configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidConfigValue { key: String, value: String },

    // Aggregation
    #[error("Insufficient exchanges for pair {base}/{quote}: {count}")]
    InsufficientExchanges { base: i32, quote: i32, count: usize },

    #[error("VWAP input empty after filtering")]
    EmptyVwapInput,

    // Generic
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ConfluenceError {
    pub fn exchange_request<E: Into<String>, S: Into<String>>(exchange: E, message: S) -> Self {
        Self::ExchangeRequest {
            exchange: exchange.into(),
            message: message.into(),
        }
    }

    pub fn exchange_status<E: Into<String>, B: Into<String>>(
        exchange: E,
        status: u16,
        body: B,
    ) -> Self {
        Self::ExchangeStatus {
            exchange: exchange.into(),
            status,
            body: body.into(),
        }
    }

    pub fn response_decode<E: Into<String>, S: Into<String>>(exchange: E, message: S) -> Self {
        Self::ResponseDecode {
            exchange: exchange.into(),
            message: message.into(),
        }
    }

    pub fn deadline<E: Into<String>>(exchange: E, deadline_ms: u64) -> Self {
        Self::Deadline {
            exchange: exchange.into(),
            deadline_ms,
        }
    }

    pub fn symbol_unresolved<E: Into<String>, S: Into<String>>(exchange: E, symbol: S) -> Self {
        Self::SymbolUnresolved {
            exchange: exchange.into(),
            symbol: symbol.into(),
        }
    }

    pub fn database_connection<S: Into<String>>(message: S) -> Self {
        Self::DatabaseConnection {
            message: message.into(),
        }
    }

    pub fn database_query<S: Into<String>>(message: S) -> Self {
        Self::DatabaseQuery {
            message: message.into(),
        }
    }

    pub fn sink_write<K: Into<String>, S: Into<String>>(sink: K, message: S) -> Self {
        Self::SinkWrite {
            sink: sink.into(),
            message: message.into(),
        }
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_config_value<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self::InvalidConfigValue {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the next cadence may succeed without operator intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ExchangeRequest { .. }
                | Self::ExchangeStatus { .. }
                | Self::ResponseDecode { .. }
                | Self::Deadline { .. }
                | Self::DatabaseQuery { .. }
                | Self::SinkWrite { .. }
        )
    }

    /// Log level the error should be reported at.
    pub fn severity(&self) -> Level {
        match self {
            Self::Configuration { .. }
            | Self::InvalidConfigValue { .. }
            | Self::DatabaseConnection { .. } => Level::ERROR,
            Self::ExchangeRequest { .. }
            | Self::ExchangeStatus { .. }
            | Self::ResponseDecode { .. }
            | Self::Deadline { .. }
            | Self::SinkWrite { .. }
            | Self::DatabaseQuery { .. }
            | Self::Internal { .. } => Level::WARN,
            Self::SymbolUnresolved { .. }
            | Self::InsufficientExchanges { .. }
            | Self::EmptyVwapInput => Level::DEBUG,
        }
    }

    /// Stable category label for structured log fields.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ExchangeRequest { .. } | Self::Deadline { .. } => "transient_network",
            Self::ExchangeStatus { .. } => "exchange_status",
            Self::ResponseDecode { .. } => "protocol_decode",
            Self::SymbolUnresolved { .. } => "symbol_unresolved",
            Self::InsufficientExchanges { .. } | Self::EmptyVwapInput => "insufficient_input",
            Self::DatabaseConnection { .. } | Self::DatabaseQuery { .. } => "database",
            Self::SinkWrite { .. } => "sink_batch_failure",
            Self::Configuration { .. } | Self::InvalidConfigValue { .. } => "config_invalid",
            Self::Internal { .. } => "internal",
        }
    }
}

impl From<sqlx::Error> for ConfluenceError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseQuery {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for ConfluenceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal {
            message: format!("json: {e}"),
        }
    }
}
