// Exchange Adapters
// One REST adapter per configured exchange; vendor formats are normalized by
// the parser the factory selects.

pub mod factory;
pub mod health;
pub mod parsers;
pub mod symbol_pair;

pub use factory::build_adapters;
pub use health::{ExchangeHealth, HealthEvent, HealthTracker, UNHEALTHY_AFTER};
pub use parsers::{parser_for, ResponseParser};
pub use symbol_pair::{format_join, parse_symbol_pair};

use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::config::ExchangeDescriptor;
use crate::error::{ConfluenceError, ConfluenceResult};
use crate::types::{CanonicalTicker, ExchangeSymbol};

/// Poller-facing surface of one exchange. Production adapters are REST
/// clients; tests substitute in-memory fakes.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    fn id(&self) -> &str;

    fn display_name(&self) -> &str;

    /// Static VWAP contribution weight, in (0, 1].
    fn weight(&self) -> Decimal;

    /// Minimum spacing between calls implied by the vendor rate limit.
    fn min_call_interval(&self) -> Duration;

    /// One GET against the ticker endpoint, decoded to canonical tickers.
    /// No partial output: any request or decode failure fails the batch.
    async fn fetch_all_tickers(&self) -> ConfluenceResult<Vec<CanonicalTicker>>;

    /// Symbol discovery endpoint; empty when the exchange does not expose one.
    async fn fetch_symbols(&self) -> ConfluenceResult<Vec<ExchangeSymbol>>;

    fn health(&self) -> ExchangeHealth;

    /// Counted by the poller for failures the adapter cannot observe itself
    /// (deadline cancellation).
    fn record_failure(&self);

    fn is_healthy(&self) -> bool;
}

/// Generic REST adapter parameterized by descriptor and parser.
pub struct RestExchangeAdapter {
    descriptor: ExchangeDescriptor,
    http: reqwest::Client,
    parser: Box<dyn ResponseParser>,
    health: HealthTracker,
}

impl RestExchangeAdapter {
    pub fn new(
        descriptor: ExchangeDescriptor,
        parser: Box<dyn ResponseParser>,
    ) -> ConfluenceResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("CryptoPlatform/1.0"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let http = reqwest::Client::builder()
            .timeout(descriptor.request_timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| {
                ConfluenceError::configuration(format!(
                    "http client for {}: {e}",
                    descriptor.id
                ))
            })?;

        Ok(Self {
            descriptor,
            http,
            parser,
            health: HealthTracker::new(),
        })
    }

    pub fn descriptor(&self) -> &ExchangeDescriptor {
        &self.descriptor
    }

    /// GET a vendor endpoint, recording the attempt against health. Returns
    /// the raw body for the parser.
    async fn get(&self, path: &str) -> ConfluenceResult<(Vec<u8>, Duration)> {
        let url = format!("{}{}", self.descriptor.base_url, path);
        let start = Instant::now();

        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                self.health.record_failure();
                return Err(ConfluenceError::exchange_request(
                    &self.descriptor.id,
                    e.to_string(),
                ));
            }
        };

        let status = response.status();
        if !status.is_success() {
            self.health.record_failure();
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(ConfluenceError::exchange_status(
                &self.descriptor.id,
                status.as_u16(),
                snippet,
            ));
        }

        match response.bytes().await {
            Ok(bytes) => Ok((bytes.to_vec(), start.elapsed())),
            Err(e) => {
                self.health.record_failure();
                Err(ConfluenceError::exchange_request(
                    &self.descriptor.id,
                    e.to_string(),
                ))
            }
        }
    }
}

#[async_trait]
impl ExchangeClient for RestExchangeAdapter {
    fn id(&self) -> &str {
        &self.descriptor.id
    }

    fn display_name(&self) -> &str {
        &self.descriptor.name
    }

    fn weight(&self) -> Decimal {
        self.descriptor.weight_decimal()
    }

    fn min_call_interval(&self) -> Duration {
        self.descriptor.min_call_interval()
    }

    async fn fetch_all_tickers(&self) -> ConfluenceResult<Vec<CanonicalTicker>> {
        let (body, elapsed) = self.get(&self.descriptor.ticker_endpoint).await?;

        match self.parser.parse_tickers(&body, &self.descriptor.id) {
            Ok(tickers) => {
                self.health.record_success(elapsed);
                Ok(tickers)
            }
            Err(e) => {
                self.health.record_failure();
                Err(e)
            }
        }
    }

    async fn fetch_symbols(&self) -> ConfluenceResult<Vec<ExchangeSymbol>> {
        if self.descriptor.symbols_endpoint.trim().is_empty() {
            return Ok(Vec::new());
        }
        let (body, elapsed) = self.get(&self.descriptor.symbols_endpoint).await?;

        match self.parser.parse_symbols(&body, &self.descriptor.id) {
            Ok(symbols) => {
                self.health.record_success(elapsed);
                Ok(symbols)
            }
            Err(e) => {
                self.health.record_failure();
                Err(e)
            }
        }
    }

    fn health(&self) -> ExchangeHealth {
        self.health.snapshot()
    }

    fn record_failure(&self) {
        self.health.record_failure();
    }

    fn is_healthy(&self) -> bool {
        self.health.is_healthy()
    }
}
