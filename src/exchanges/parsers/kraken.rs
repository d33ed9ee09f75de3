// Kraken parser: `result` map keyed by vendor-internal symbol, indexed-array
// stat fields (`c[0]` close, `v[1]` 24h volume).

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::SymbolFormat;
use crate::error::{ConfluenceError, ConfluenceResult};
use crate::exchanges::symbol_pair::parse_symbol_pair;
use crate::types::{CanonicalTicker, ExchangeSymbol};

use super::{array_decimal_field, string_field, ResponseParser};

pub struct KrakenParser {
    quotes: Vec<String>,
}

impl KrakenParser {
    pub fn new(quotes: Vec<String>) -> Self {
        Self { quotes }
    }
}

#[derive(Deserialize)]
struct KrakenResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: Map<String, Value>,
}

impl ResponseParser for KrakenParser {
    fn parse_tickers(
        &self,
        data: &[u8],
        exchange_id: &str,
    ) -> ConfluenceResult<Vec<CanonicalTicker>> {
        let response: KrakenResponse = serde_json::from_slice(data)
            .map_err(|e| ConfluenceError::response_decode(exchange_id, e.to_string()))?;

        if !response.error.is_empty() {
            return Err(ConfluenceError::response_decode(
                exchange_id,
                format!("kraken API error: {:?}", response.error),
            ));
        }

        let mut tickers = Vec::with_capacity(response.result.len());
        for (symbol, value) in &response.result {
            let Some(record) = value.as_object() else {
                continue;
            };
            let (base, quote) = parse_symbol_pair(symbol, SymbolFormat::Kraken, &self.quotes);
            let ticker = CanonicalTicker {
                exchange_id: exchange_id.to_string(),
                raw_symbol: symbol.clone(),
                base_symbol: base,
                quote_symbol: quote,
                base_token_id: 0,
                quote_token_id: 0,
                price: array_decimal_field(record, "c", 0),
                volume_24h: array_decimal_field(record, "v", 1),
                quote_volume_24h: rust_decimal::Decimal::ZERO,
                high_24h: array_decimal_field(record, "h", 1),
                low_24h: array_decimal_field(record, "l", 1),
                price_change_24h: rust_decimal::Decimal::ZERO,
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
        let response: KrakenResponse = serde_json::from_slice(data)
            .map_err(|e| ConfluenceError::response_decode(exchange_id, e.to_string()))?;

        if !response.error.is_empty() {
            return Err(ConfluenceError::response_decode(
                exchange_id,
                format!("kraken API error: {:?}", response.error),
            ));
        }

        let mut symbols = Vec::with_capacity(response.result.len());
        for (symbol, value) in &response.result {
            let Some(record) = value.as_object() else {
                continue;
            };
            if string_field(record, "status").unwrap_or("online") != "online" {
                continue;
            }
            let (base, quote) = parse_symbol_pair(symbol, SymbolFormat::Kraken, &self.quotes);
            symbols.push(ExchangeSymbol {
                exchange_id: exchange_id.to_string(),
                symbol: symbol.clone(),
                base_symbol: base,
                quote_symbol: quote,
                is_active: true,
            });
        }
        Ok(symbols)
    }
}
