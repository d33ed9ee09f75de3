// Vendor response parsers.
//
// Every parser turns one raw HTTP body into canonical tickers. Field
// candidate lists for the long tail live here as data, not per-vendor code
// paths.

mod binance;
mod bybit;
mod coinbase;
mod keyed;
mod kraken;
mod nested;
mod unified;

pub use binance::BinanceParser;
pub use bybit::BybitParser;
pub use coinbase::CoinbaseParser;
pub use keyed::KeyedObjectParser;
pub use kraken::KrakenParser;
pub use nested::NestedDataParser;
pub use unified::UnifiedParser;

use chrono::Utc;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::config::{ExchangeDescriptor, SymbolFormat};
use crate::error::ConfluenceResult;
use crate::exchanges::symbol_pair::parse_symbol_pair;
use crate::types::{CanonicalTicker, ExchangeSymbol};

/// Decodes a vendor ticker/symbol payload into canonical records.
pub trait ResponseParser: Send + Sync {
    fn parse_tickers(&self, data: &[u8], exchange_id: &str)
        -> ConfluenceResult<Vec<CanonicalTicker>>;

    fn parse_symbols(&self, data: &[u8], exchange_id: &str)
        -> ConfluenceResult<Vec<ExchangeSymbol>>;
}

/// Candidate field names scanned by the unified parser, in priority order.
pub const SYMBOL_FIELDS: &[&str] = &[
    "symbol",
    "Symbol",
    "pair",
    "market",
    "instId",
    "ticker_id",
    "id",
];
pub const PRICE_FIELDS: &[&str] = &["last", "lastPrice", "last_price", "price", "close", "lastTrade"];
pub const VOLUME_FIELDS: &[&str] = &[
    "volume",
    "vol",
    "volume_24h",
    "baseVolume",
    "base_volume",
    "vol24h",
];
pub const QUOTE_VOLUME_FIELDS: &[&str] = &[
    "quoteVolume",
    "quote_volume",
    "volCcy",
    "volume_usd",
    "quoteVol",
];
pub const CHANGE_FIELDS: &[&str] = &["priceChange", "price_change", "change", "priceChange24h"];
pub const HIGH_FIELDS: &[&str] = &["high", "highPrice", "high_24h", "high24h", "h"];
pub const LOW_FIELDS: &[&str] = &["low", "lowPrice", "low_24h", "low24h", "l"];

/// Select the parser for a descriptor. Vendor families with a dedicated
/// parser are keyed by exchange id; everything else goes through the unified
/// candidate scan.
pub fn parser_for(descriptor: &ExchangeDescriptor) -> Box<dyn ResponseParser> {
    let quotes = descriptor.effective_quote_currencies();
    let format = descriptor.format();
    match descriptor.id.as_str() {
        "binance" | "mexc" => Box::new(BinanceParser::new(quotes)),
        "coinbase" | "gemini" => Box::new(CoinbaseParser::new(quotes)),
        "kraken" => Box::new(KrakenParser::new(quotes)),
        "bybit" => Box::new(BybitParser::new(quotes, format)),
        "whitebit" | "coinw" => Box::new(KeyedObjectParser::new(quotes, format)),
        "bitmart" | "kucoin" | "pionex" => Box::new(NestedDataParser::new(quotes, format)),
        _ => Box::new(UnifiedParser::new(quotes, format)),
    }
}

pub(crate) fn string_field<'a>(map: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    match map.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
        _ => None,
    }
}

/// Parse a JSON value as decimal. Vendors emit numerics as strings, floats
/// and integers interchangeably.
pub(crate) fn decimal_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => s.trim().parse::<Decimal>().ok(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else {
                n.as_f64().and_then(Decimal::from_f64)
            }
        }
        _ => None,
    }
}

pub(crate) fn decimal_field(map: &Map<String, Value>, field: &str) -> Decimal {
    map.get(field)
        .and_then(decimal_value)
        .unwrap_or(Decimal::ZERO)
}

/// Kraken-style indexed array field, e.g. `c[0]` for the close price.
pub(crate) fn array_decimal_field(map: &Map<String, Value>, field: &str, index: usize) -> Decimal {
    match map.get(field) {
        Some(Value::Array(items)) => items
            .get(index)
            .and_then(decimal_value)
            .unwrap_or(Decimal::ZERO),
        _ => Decimal::ZERO,
    }
}

/// Ordered candidate scan. `positive_only` applies to price/volume/high/low;
/// the change field keeps sign and zero.
pub(crate) fn scan_decimal(
    map: &Map<String, Value>,
    fields: &[&str],
    positive_only: bool,
) -> Decimal {
    for field in fields {
        if let Some(value) = map.get(*field) {
            if let Some(d) = decimal_value(value) {
                if !positive_only || d > Decimal::ZERO {
                    return d;
                }
            }
        }
    }
    Decimal::ZERO
}

pub(crate) fn scan_symbol(map: &Map<String, Value>) -> Option<String> {
    for field in SYMBOL_FIELDS {
        if let Some(s) = string_field(map, field) {
            return Some(s.to_string());
        }
    }
    None
}

/// Build a ticker from a flat vendor record via the candidate lists.
pub(crate) fn ticker_from_record(
    map: &Map<String, Value>,
    symbol: &str,
    exchange_id: &str,
    format: SymbolFormat,
    quotes: &[String],
) -> CanonicalTicker {
    let (base, quote) = parse_symbol_pair(symbol, format, quotes);
    CanonicalTicker {
        exchange_id: exchange_id.to_string(),
        raw_symbol: symbol.to_string(),
        base_symbol: base,
        quote_symbol: quote,
        base_token_id: 0,
        quote_token_id: 0,
        price: scan_decimal(map, PRICE_FIELDS, true),
        volume_24h: scan_decimal(map, VOLUME_FIELDS, true),
        quote_volume_24h: scan_decimal(map, QUOTE_VOLUME_FIELDS, true),
        high_24h: scan_decimal(map, HIGH_FIELDS, true),
        low_24h: scan_decimal(map, LOW_FIELDS, true),
        price_change_24h: scan_decimal(map, CHANGE_FIELDS, false),
        timestamp: Utc::now(),
    }
}
