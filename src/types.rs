// Core domain types shared across the pipeline.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Unresolved token id sentinel. Tickers carrying it are persisted for
/// telemetry but excluded from VWAP input.
pub const UNRESOLVED_TOKEN: i32 = 0;

/// Provenance of a symbol-to-token assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingMethod {
    Manual,
    Slug,
    Symbol,
    Fuzzy,
}

impl MappingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingMethod::Manual => "manual",
            MappingMethod::Slug => "slug",
            MappingMethod::Symbol => "symbol",
            MappingMethod::Fuzzy => "fuzzy",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(MappingMethod::Manual),
            "slug" => Some(MappingMethod::Slug),
            "symbol" => Some(MappingMethod::Symbol),
            "fuzzy" => Some(MappingMethod::Fuzzy),
            _ => None,
        }
    }
}

/// A base/quote token id pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenPair {
    pub base_token_id: i32,
    pub quote_token_id: i32,
}

impl TokenPair {
    pub fn new(base_token_id: i32, quote_token_id: i32) -> Self {
        Self {
            base_token_id,
            quote_token_id,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.base_token_id != UNRESOLVED_TOKEN && self.quote_token_id != UNRESOLVED_TOKEN
    }
}

/// Canonical per-symbol snapshot emitted by an adapter and enriched by the
/// resolver. Ephemeral; persisted rows are built from it at the sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalTicker {
    pub exchange_id: String,
    /// Vendor symbol exactly as received.
    pub raw_symbol: String,
    pub base_symbol: String,
    pub quote_symbol: String,
    /// 0 until resolved.
    pub base_token_id: i32,
    /// 0 until resolved.
    pub quote_token_id: i32,
    pub price: Decimal,
    pub volume_24h: Decimal,
    pub quote_volume_24h: Decimal,
    pub high_24h: Decimal,
    pub low_24h: Decimal,
    pub price_change_24h: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl CanonicalTicker {
    pub fn pair(&self) -> TokenPair {
        TokenPair::new(self.base_token_id, self.quote_token_id)
    }

    pub fn is_resolved(&self) -> bool {
        self.pair().is_resolved()
    }

    /// Both legs parsed out of the vendor symbol.
    pub fn has_parsed_pair(&self) -> bool {
        !self.base_symbol.is_empty() && !self.quote_symbol.is_empty()
    }
}

/// A tradable symbol reported by an exchange's discovery endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeSymbol {
    pub exchange_id: String,
    pub symbol: String,
    pub base_symbol: String,
    pub quote_symbol: String,
    pub is_active: bool,
}

/// Cross-exchange volume-weighted average price for one pair at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VwapResult {
    pub base_token_id: i32,
    pub quote_token_id: i32,
    pub vwap_price: Decimal,
    pub total_volume: Decimal,
    pub exchange_count: usize,
    /// Deduplicated; order is stable (sorted) for deterministic output.
    pub contributing_exchanges: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// A flagged per-exchange price deviation, persisted only for low-confidence
/// (`symbol`-method) mappings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outlier {
    pub exchange_id: String,
    pub base_token_id: i32,
    pub quote_token_id: i32,
    pub exchange_price: Decimal,
    pub average_price: Decimal,
    pub deviation_percent: f64,
    pub std_deviations: f64,
    pub mapping_method: MappingMethod,
    pub detected_at: DateTime<Utc>,
    pub is_resolved: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ticker() -> CanonicalTicker {
        CanonicalTicker {
            exchange_id: "binance".into(),
            raw_symbol: "BTCUSDT".into(),
            base_symbol: "BTC".into(),
            quote_symbol: "USDT".into(),
            base_token_id: 1,
            quote_token_id: 2,
            price: dec!(50000),
            volume_24h: dec!(10),
            quote_volume_24h: dec!(500000),
            high_24h: dec!(51000),
            low_24h: dec!(49000),
            price_change_24h: dec!(100),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn resolved_pair_requires_both_legs() {
        let mut t = ticker();
        assert!(t.is_resolved());
        t.quote_token_id = UNRESOLVED_TOKEN;
        assert!(!t.is_resolved());
    }

    #[test]
    fn mapping_method_round_trips() {
        for m in [
            MappingMethod::Manual,
            MappingMethod::Slug,
            MappingMethod::Symbol,
            MappingMethod::Fuzzy,
        ] {
            assert_eq!(MappingMethod::from_str_opt(m.as_str()), Some(m));
        }
        assert_eq!(MappingMethod::from_str_opt("unknown"), None);
    }
}
