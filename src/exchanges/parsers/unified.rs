// Unified parser for the long tail of vendors.
//
// Shape detection, in order: top-level array; object with a `data`, `result`,
// `tickers` or `ticker` array field; object keyed by symbol. Record fields
// are resolved through the candidate lists in the parent module.

use serde_json::{Map, Value};

use crate::config::SymbolFormat;
use crate::error::{ConfluenceError, ConfluenceResult};
use crate::exchanges::symbol_pair::parse_symbol_pair;
use crate::types::{CanonicalTicker, ExchangeSymbol};

use super::{scan_symbol, ticker_from_record, ResponseParser};

const ARRAY_ENVELOPE_FIELDS: &[&str] = &["data", "result", "tickers", "ticker"];

pub struct UnifiedParser {
    quotes: Vec<String>,
    format: SymbolFormat,
}

enum Shape {
    /// Flat records; symbol comes from a record field.
    Records(Vec<Map<String, Value>>),
    /// Map from symbol to record.
    Keyed(Map<String, Value>),
}

impl UnifiedParser {
    pub fn new(quotes: Vec<String>, format: SymbolFormat) -> Self {
        Self { quotes, format }
    }

    fn detect_shape(data: &[u8], exchange_id: &str) -> ConfluenceResult<Shape> {
        let root: Value = serde_json::from_slice(data)
            .map_err(|e| ConfluenceError::response_decode(exchange_id, e.to_string()))?;

        match root {
            Value::Array(items) => Ok(Shape::Records(
                items.into_iter().filter_map(object_of).collect(),
            )),
            Value::Object(map) => {
                for field in ARRAY_ENVELOPE_FIELDS {
                    if let Some(Value::Array(items)) = map.get(*field) {
                        return Ok(Shape::Records(
                            items.iter().filter_map(|v| v.as_object().cloned()).collect(),
                        ));
                    }
                }
                // `data`/`result` may itself be a symbol-keyed object.
                for field in ["data", "result"] {
                    if let Some(Value::Object(inner)) = map.get(field) {
                        return Ok(Shape::Keyed(inner.clone()));
                    }
                }
                Ok(Shape::Keyed(map))
            }
            _ => Err(ConfluenceError::response_decode(
                exchange_id,
                "unable to parse ticker response",
            )),
        }
    }

    fn build(
        &self,
        record: &Map<String, Value>,
        symbol: &str,
        exchange_id: &str,
    ) -> CanonicalTicker {
        ticker_from_record(record, symbol, exchange_id, self.format, &self.quotes)
    }
}

fn object_of(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

impl ResponseParser for UnifiedParser {
    fn parse_tickers(
        &self,
        data: &[u8],
        exchange_id: &str,
    ) -> ConfluenceResult<Vec<CanonicalTicker>> {
        let mut tickers = Vec::new();
        match Self::detect_shape(data, exchange_id)? {
            Shape::Records(records) => {
                for record in &records {
                    let Some(symbol) = scan_symbol(record) else {
                        continue;
                    };
                    let ticker = self.build(record, &symbol, exchange_id);
                    if ticker.price.is_sign_positive() && !ticker.price.is_zero() {
                        tickers.push(ticker);
                    }
                }
            }
            Shape::Keyed(map) => {
                for (symbol, value) in &map {
                    let Some(record) = value.as_object() else {
                        continue;
                    };
                    let ticker = self.build(record, symbol, exchange_id);
                    if ticker.price.is_sign_positive() && !ticker.price.is_zero() {
                        tickers.push(ticker);
                    }
                }
            }
        }
        Ok(tickers)
    }

    fn parse_symbols(
        &self,
        data: &[u8],
        exchange_id: &str,
    ) -> ConfluenceResult<Vec<ExchangeSymbol>> {
        let mut symbols = Vec::new();
        match Self::detect_shape(data, exchange_id)? {
            Shape::Records(records) => {
                for record in &records {
                    let Some(symbol) = scan_symbol(record) else {
                        continue;
                    };
                    let (base, quote) = parse_symbol_pair(&symbol, self.format, &self.quotes);
                    symbols.push(ExchangeSymbol {
                        exchange_id: exchange_id.to_string(),
                        symbol,
                        base_symbol: base,
                        quote_symbol: quote,
                        is_active: true,
                    });
                }
            }
            Shape::Keyed(map) => {
                for (symbol, value) in &map {
                    if !value.is_object() {
                        continue;
                    }
                    let (base, quote) = parse_symbol_pair(symbol, self.format, &self.quotes);
                    symbols.push(ExchangeSymbol {
                        exchange_id: exchange_id.to_string(),
                        symbol: symbol.clone(),
                        base_symbol: base,
                        quote_symbol: quote,
                        is_active: true,
                    });
                }
            }
        }
        Ok(symbols)
    }
}
