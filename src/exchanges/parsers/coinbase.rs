// Coinbase-style parser: product objects with nested `stats`. Gemini shares
// the shape.

use chrono::Utc;
use serde_json::{Map, Value};

use crate::config::SymbolFormat;
use crate::error::{ConfluenceError, ConfluenceResult};
use crate::exchanges::symbol_pair::parse_symbol_pair;
use crate::types::{CanonicalTicker, ExchangeSymbol};

use super::{decimal_field, string_field, ResponseParser};

pub struct CoinbaseParser {
    quotes: Vec<String>,
}

impl CoinbaseParser {
    pub fn new(quotes: Vec<String>) -> Self {
        Self { quotes }
    }
}

impl ResponseParser for CoinbaseParser {
    fn parse_tickers(
        &self,
        data: &[u8],
        exchange_id: &str,
    ) -> ConfluenceResult<Vec<CanonicalTicker>> {
        let products: Vec<Map<String, Value>> = serde_json::from_slice(data)
            .map_err(|e| ConfluenceError::response_decode(exchange_id, e.to_string()))?;

        let mut tickers = Vec::with_capacity(products.len());
        for product in &products {
            if string_field(product, "status") != Some("online") {
                continue;
            }
            let Some(stats) = product.get("stats").and_then(Value::as_object) else {
                continue;
            };
            let Some(symbol) = string_field(product, "id") else {
                continue;
            };

            let (base, quote) = parse_symbol_pair(symbol, SymbolFormat::Hyphen, &self.quotes);
            let ticker = CanonicalTicker {
                exchange_id: exchange_id.to_string(),
                raw_symbol: symbol.to_string(),
                base_symbol: base,
                quote_symbol: quote,
                base_token_id: 0,
                quote_token_id: 0,
                price: decimal_field(stats, "last"),
                volume_24h: decimal_field(stats, "volume"),
                quote_volume_24h: decimal_field(stats, "volume_30day"),
                high_24h: decimal_field(stats, "high"),
                low_24h: decimal_field(stats, "low"),
                price_change_24h: decimal_field(stats, "change"),
                timestamp: Utc::now(),
            };

            if ticker.price.is_sign_positive() && !ticker.price.is_zero() {
                tickers.push(ticker);
            }
        }
        Ok(tickers)
    }

    fn parse_symbols(
        &self,
        data: &[u8],
        exchange_id: &str,
    ) -> ConfluenceResult<Vec<ExchangeSymbol>> {
        let products: Vec<Map<String, Value>> = serde_json::from_slice(data)
            .map_err(|e| ConfluenceError::response_decode(exchange_id, e.to_string()))?;

        let mut symbols = Vec::with_capacity(products.len());
        for product in &products {
            if string_field(product, "status") != Some("online") {
                continue;
            }
            let (Some(id), Some(base), Some(quote)) = (
                string_field(product, "id"),
                string_field(product, "base_currency"),
                string_field(product, "quote_currency"),
            ) else {
                continue;
            };
            symbols.push(ExchangeSymbol {
                exchange_id: exchange_id.to_string(),
                symbol: id.to_string(),
                base_symbol: base.to_string(),
                quote_symbol: quote.to_string(),
                is_active: true,
            });
        }
        Ok(symbols)
    }
}
