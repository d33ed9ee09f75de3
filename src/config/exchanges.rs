// Exchange descriptor file
// One JSON document describes every polled exchange; descriptors are
// immutable for the process lifetime.

use std::fs;
use std::path::Path;
use std::time::Duration;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ConfluenceError, ConfluenceResult};

/// Vendor symbol notation, derived from the descriptor's example string
/// (e.g. `"BTC-USDT"` or `"XXBTZUSD"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolFormat {
    /// `BTCUSDT`
    Concatenated,
    /// `btcusdt`
    ConcatenatedLower,
    /// `BTC-USDT`
    Hyphen,
    /// `BTC_USDT`
    Underscore,
    /// `BTC/USDT`
    Slash,
    /// `tBTCUSD` (Bitfinex)
    BitfinexT,
    /// `XXBTZUSD` (Kraken)
    Kraken,
}

impl SymbolFormat {
    pub fn from_example(example: &str) -> Self {
        let e = example.trim();
        if e.is_empty() {
            SymbolFormat::Concatenated
        } else if e.contains('-') {
            SymbolFormat::Hyphen
        } else if e.contains('_') {
            SymbolFormat::Underscore
        } else if e.contains('/') {
            SymbolFormat::Slash
        } else if e.starts_with('t') && e.len() > 1 && e[1..].chars().all(|c| c.is_ascii_uppercase())
        {
            SymbolFormat::BitfinexT
        } else if e.starts_with("XXBT") || e.starts_with('X') && e.contains('Z') && e.len() > 6 {
            SymbolFormat::Kraken
        } else if e.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) {
            SymbolFormat::ConcatenatedLower
        } else {
            SymbolFormat::Concatenated
        }
    }

    pub fn separator(&self) -> Option<char> {
        match self {
            SymbolFormat::Hyphen => Some('-'),
            SymbolFormat::Underscore => Some('_'),
            SymbolFormat::Slash => Some('/'),
            _ => None,
        }
    }
}

/// One entry of the exchange configuration document (spec format: a JSON
/// object with an `exchanges` array).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeDescriptor {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub ticker_endpoint: String,
    #[serde(default)]
    pub symbols_endpoint: String,
    pub rate_limit_per_minute: u32,
    #[serde(default)]
    pub weight: f64,
    /// Milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default)]
    pub symbol_format: String,
    #[serde(default)]
    pub quote_currencies: Vec<String>,
    #[serde(default)]
    pub disabled: bool,
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_retry_attempts() -> u32 {
    3
}

impl ExchangeDescriptor {
    pub fn format(&self) -> SymbolFormat {
        SymbolFormat::from_example(&self.symbol_format)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }

    /// Minimum spacing between calls implied by the vendor rate limit.
    pub fn min_call_interval(&self) -> Duration {
        Duration::from_secs(60) / self.rate_limit_per_minute.max(1)
    }

    /// Static exchange weight for VWAP contribution; descriptors without one
    /// fall back to the built-in table.
    pub fn weight_decimal(&self) -> Decimal {
        if self.weight > 0.0 {
            Decimal::from_f64(self.weight).unwrap_or_else(|| default_exchange_weight(&self.id))
        } else {
            default_exchange_weight(&self.id)
        }
    }

    /// Ordered quote-currency list; fiat and stablecoins lead so that
    /// ambiguous concatenated symbols peel the fiat leg as quote.
    pub fn effective_quote_currencies(&self) -> Vec<String> {
        if self.quote_currencies.is_empty() {
            default_quote_currencies()
        } else {
            self.quote_currencies
                .iter()
                .map(|q| q.to_uppercase())
                .collect()
        }
    }

    pub fn validate(&self) -> ConfluenceResult<()> {
        if self.id.trim().is_empty() {
            return Err(ConfluenceError::invalid_config_value("exchange.id", ""));
        }
        if !self.base_url.starts_with("http") {
            return Err(ConfluenceError::invalid_config_value(
                format!("exchange.{}.base_url", self.id),
                &self.base_url,
            ));
        }
        if self.rate_limit_per_minute == 0 {
            return Err(ConfluenceError::invalid_config_value(
                format!("exchange.{}.rate_limit_per_minute", self.id),
                "0",
            ));
        }
        if self.weight < 0.0 || self.weight > 1.0 {
            return Err(ConfluenceError::invalid_config_value(
                format!("exchange.{}.weight", self.id),
                self.weight.to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeDocument {
    exchanges: Vec<ExchangeDescriptor>,
}

/// Load and validate the descriptor document, dropping disabled entries.
pub fn load_exchange_descriptors(
    path: impl AsRef<Path>,
) -> ConfluenceResult<Vec<ExchangeDescriptor>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|e| {
        ConfluenceError::configuration(format!(
            "cannot read exchange config {}: {e}",
            path.display()
        ))
    })?;

    let doc: ExchangeDocument = serde_json::from_str(&raw).map_err(|e| {
        ConfluenceError::configuration(format!(
            "cannot parse exchange config {}: {e}",
            path.display()
        ))
    })?;

    let mut descriptors = Vec::with_capacity(doc.exchanges.len());
    for descriptor in doc.exchanges {
        descriptor.validate()?;
        if descriptor.disabled {
            continue;
        }
        descriptors.push(descriptor);
    }

    if descriptors.is_empty() {
        return Err(ConfluenceError::configuration(
            "exchange config contains no enabled exchanges",
        ));
    }

    Ok(descriptors)
}

/// Fallback weights for descriptors that omit one. Unknown exchanges get 0.01.
pub fn default_exchange_weight(exchange_id: &str) -> Decimal {
    let basis_points: i64 = match exchange_id {
        "binance" => 1500,
        "coinbase" => 1200,
        "kraken" => 1000,
        "okx" => 800,
        "bybit" => 700,
        "bitget" => 600,
        "gateio" => 500,
        "kucoin" => 500,
        "huobi" => 400,
        "cryptocom" => 300,
        "mexc" => 300,
        "bitfinex" => 300,
        "gemini" => 200,
        "bitstamp" => 200,
        _ => 100,
    };
    Decimal::new(basis_points, 4)
}

/// Default quote currencies when a descriptor omits the list. Stablecoins and
/// fiat precede crypto quotes; suffix matching tries longest first, so this
/// ordering only breaks length ties.
pub fn default_quote_currencies() -> Vec<String> {
    [
        // Stablecoins
        "USDT", "USDC", "BUSD", "DAI", "TUSD", "FDUSD", "USDP", "EURI", "USD",
        // Fiat
        "EUR", "GBP", "JPY", "KRW", "INR", "TRY", "BRL", "MXN", "ARS", "ZAR", "UAH", "COP", "SGD",
        "AUD", "CAD", "CHF", "PLN", "RUB", "CNY", "HKD", "NZD", "THB", "IDR", "PHP",
        // Crypto quotes
        "BTC", "ETH", "BNB", "SOL", "DOGE", "SHIB",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_detection_covers_documented_variants() {
        assert_eq!(
            SymbolFormat::from_example("BTCUSDT"),
            SymbolFormat::Concatenated
        );
        assert_eq!(
            SymbolFormat::from_example("btcusdt"),
            SymbolFormat::ConcatenatedLower
        );
        assert_eq!(SymbolFormat::from_example("BTC-USDT"), SymbolFormat::Hyphen);
        assert_eq!(
            SymbolFormat::from_example("BTC_USDT"),
            SymbolFormat::Underscore
        );
        assert_eq!(
            SymbolFormat::from_example("tBTCUSD"),
            SymbolFormat::BitfinexT
        );
        assert_eq!(
            SymbolFormat::from_example("XXBTZUSD"),
            SymbolFormat::Kraken
        );
    }

    #[test]
    fn descriptor_validation_rejects_bad_weight() {
        let d = ExchangeDescriptor {
            id: "binance".into(),
            name: "Binance".into(),
            base_url: "https://api.binance.com".into(),
            ticker_endpoint: "/api/v3/ticker/24hr".into(),
            symbols_endpoint: "/api/v3/exchangeInfo".into(),
            rate_limit_per_minute: 1200,
            weight: 1.5,
            request_timeout: 5000,
            retry_attempts: 3,
            symbol_format: "BTCUSDT".into(),
            quote_currencies: vec![],
            disabled: false,
        };
        assert!(d.validate().is_err());
    }

    #[test]
    fn default_weight_table_has_floor() {
        assert_eq!(default_exchange_weight("binance"), Decimal::new(1500, 4));
        assert_eq!(default_exchange_weight("no-such-venue"), Decimal::new(100, 4));
    }

    #[test]
    fn rate_limit_implies_min_interval() {
        let d = ExchangeDescriptor {
            id: "kraken".into(),
            name: "Kraken".into(),
            base_url: "https://api.kraken.com".into(),
            ticker_endpoint: "/0/public/Ticker".into(),
            symbols_endpoint: String::new(),
            rate_limit_per_minute: 60,
            weight: 0.1,
            request_timeout: 5000,
            retry_attempts: 3,
            symbol_format: "XXBTZUSD".into(),
            quote_currencies: vec![],
            disabled: false,
        };
        assert_eq!(d.min_call_interval(), Duration::from_secs(1));
    }
}
