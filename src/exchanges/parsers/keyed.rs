// Keyed-object parser: the whole response is a map from vendor symbol to a
// flat stats record (WhiteBIT, CoinW). Record fields go through the unified
// candidate scan.

use serde_json::{Map, Value};

use crate::config::SymbolFormat;
use crate::error::{ConfluenceError, ConfluenceResult};
use crate::exchanges::symbol_pair::parse_symbol_pair;
use crate::types::{CanonicalTicker, ExchangeSymbol};

use super::{ticker_from_record, ResponseParser};

pub struct KeyedObjectParser {
    quotes: Vec<String>,
    format: SymbolFormat,
}

impl KeyedObjectParser {
    pub fn new(quotes: Vec<String>, format: SymbolFormat) -> Self {
        Self { quotes, format }
    }

    fn record_map(data: &[u8], exchange_id: &str) -> ConfluenceResult<Map<String, Value>> {
        let root: Map<String, Value> = serde_json::from_slice(data)
            .map_err(|e| ConfluenceError::response_decode(exchange_id, e.to_string()))?;

        // Some vendors wrap the symbol map in a `data`/`result` envelope.
        for field in ["data", "result"] {
            if let Some(Value::Object(inner)) = root.get(field) {
                return Ok(inner.clone());
            }
        }
        Ok(root)
    }
}

impl ResponseParser for KeyedObjectParser {
    fn parse_tickers(
        &self,
        data: &[u8],
        exchange_id: &str,
    ) -> ConfluenceResult<Vec<CanonicalTicker>> {
        let records = Self::record_map(data, exchange_id)?;

        let mut tickers = Vec::with_capacity(records.len());
        for (symbol, value) in &records {
            let Some(record) = value.as_object() else {
                continue;
            };
            let ticker = ticker_from_record(record, symbol, exchange_id, self.format, &self.quotes);
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
        let records = Self::record_map(data, exchange_id)?;

        let mut symbols = Vec::with_capacity(records.len());
        for (symbol, value) in &records {
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
        Ok(symbols)
    }
}
