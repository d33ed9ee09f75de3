// Bybit v5 parser: tickers under `result.list`, instruments under the same
// envelope with `baseCoin`/`quoteCoin`.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::SymbolFormat;
use crate::error::{ConfluenceError, ConfluenceResult};
use crate::exchanges::symbol_pair::parse_symbol_pair;
use crate::types::{CanonicalTicker, ExchangeSymbol};

use super::{decimal_field, string_field, ResponseParser};

pub struct BybitParser {
    quotes: Vec<String>,
    format: SymbolFormat,
}

impl BybitParser {
    pub fn new(quotes: Vec<String>, format: SymbolFormat) -> Self {
        Self { quotes, format }
    }
}

#[derive(Deserialize)]
struct Envelope {
    result: EnvelopeResult,
}

#[derive(Deserialize)]
struct EnvelopeResult {
    #[serde(default)]
    list: Vec<Map<String, Value>>,
}

impl ResponseParser for BybitParser {
    fn parse_tickers(
        &self,
        data: &[u8],
        exchange_id: &str,
    ) -> ConfluenceResult<Vec<CanonicalTicker>> {
        let envelope: Envelope = serde_json::from_slice(data)
            .map_err(|e| ConfluenceError::response_decode(exchange_id, e.to_string()))?;

        let mut tickers = Vec::with_capacity(envelope.result.list.len());
        for record in &envelope.result.list {
            let Some(symbol) = string_field(record, "symbol") else {
                continue;
            };
            let (base, quote) = parse_symbol_pair(symbol, self.format, &self.quotes);

            let price = decimal_field(record, "lastPrice");
            let prev = decimal_field(record, "prevPrice24h");
            let change = if prev.is_zero() {
                Decimal::ZERO
            } else {
                price - prev
            };

            let ticker = CanonicalTicker {
                exchange_id: exchange_id.to_string(),
                raw_symbol: symbol.to_string(),
                base_symbol: base,
                quote_symbol: quote,
                base_token_id: 0,
                quote_token_id: 0,
                price,
                volume_24h: decimal_field(record, "volume24h"),
                quote_volume_24h: decimal_field(record, "turnover24h"),
                high_24h: decimal_field(record, "highPrice24h"),
                low_24h: decimal_field(record, "lowPrice24h"),
                price_change_24h: change,
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
        let envelope: Envelope = serde_json::from_slice(data)
            .map_err(|e| ConfluenceError::response_decode(exchange_id, e.to_string()))?;

        let mut symbols = Vec::with_capacity(envelope.result.list.len());
        for record in &envelope.result.list {
            let Some(symbol) = string_field(record, "symbol") else {
                continue;
            };
            if string_field(record, "status").unwrap_or("Trading") != "Trading" {
                continue;
            }
            let base = string_field(record, "baseCoin").unwrap_or_default();
            let quote = string_field(record, "quoteCoin").unwrap_or_default();
            symbols.push(ExchangeSymbol {
                exchange_id: exchange_id.to_string(),
                symbol: symbol.to_string(),
                base_symbol: base.to_string(),
                quote_symbol: quote.to_string(),
                is_active: true,
            });
        }
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const BODY: &str = r#"{
        "retCode": 0,
        "result": {
            "category": "spot",
            "list": [
                {"symbol":"BTCUSDT","lastPrice":"50050","prevPrice24h":"49950",
                 "volume24h":"3200.7","turnover24h":"160000000","highPrice24h":"50600","lowPrice24h":"49300"}
            ]
        }
    }"#;

    #[test]
    fn parses_result_list() {
        let parser = BybitParser::new(vec!["USDT".into()], SymbolFormat::Concatenated);
        let tickers = parser.parse_tickers(BODY.as_bytes(), "bybit").unwrap();
        assert_eq!(tickers.len(), 1);
        let t = &tickers[0];
        assert_eq!(t.base_symbol, "BTC");
        assert_eq!(t.price, dec!(50050));
        assert_eq!(t.price_change_24h, dec!(100));
    }

    #[test]
    fn instruments_filtered_by_status() {
        let body = r#"{"result":{"list":[
            {"symbol":"BTCUSDT","status":"Trading","baseCoin":"BTC","quoteCoin":"USDT"},
            {"symbol":"OLDUSDT","status":"Closed","baseCoin":"OLD","quoteCoin":"USDT"}
        ]}}"#;
        let parser = BybitParser::new(vec!["USDT".into()], SymbolFormat::Concatenated);
        let symbols = parser.parse_symbols(body.as_bytes(), "bybit").unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].base_symbol, "BTC");
    }
}
