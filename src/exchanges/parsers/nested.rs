// Nested-data parser: ticker arrays under `data.tickers` or `data.ticker`
// (BitMart, KuCoin, Pionex). Records go through the unified candidate scan.

use serde_json::{Map, Value};

use crate::config::SymbolFormat;
use crate::error::{ConfluenceError, ConfluenceResult};
use crate::exchanges::symbol_pair::parse_symbol_pair;
use crate::types::{CanonicalTicker, ExchangeSymbol};

use super::{scan_symbol, ticker_from_record, ResponseParser};

pub struct NestedDataParser {
    quotes: Vec<String>,
    format: SymbolFormat,
}

impl NestedDataParser {
    pub fn new(quotes: Vec<String>, format: SymbolFormat) -> Self {
        Self { quotes, format }
    }

    fn records(data: &[u8], exchange_id: &str) -> ConfluenceResult<Vec<Map<String, Value>>> {
        let root: Map<String, Value> = serde_json::from_slice(data)
            .map_err(|e| ConfluenceError::response_decode(exchange_id, e.to_string()))?;

        let Some(inner) = root.get("data").and_then(Value::as_object) else {
            return Err(ConfluenceError::response_decode(
                exchange_id,
                "missing data object",
            ));
        };

        for field in ["tickers", "ticker", "symbols"] {
            if let Some(Value::Array(items)) = inner.get(field) {
                return Ok(items
                    .iter()
                    .filter_map(|v| v.as_object().cloned())
                    .collect());
            }
        }

        Err(ConfluenceError::response_decode(
            exchange_id,
            "no ticker array under data",
        ))
    }
}

impl ResponseParser for NestedDataParser {
    fn parse_tickers(
        &self,
        data: &[u8],
        exchange_id: &str,
    ) -> ConfluenceResult<Vec<CanonicalTicker>> {
        let records = Self::records(data, exchange_id)?;

        let mut tickers = Vec::with_capacity(records.len());
        for record in &records {
            let Some(symbol) = scan_symbol(record) else {
                continue;
            };
            let ticker =
                ticker_from_record(record, &symbol, exchange_id, self.format, &self.quotes);
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
        let records = Self::records(data, exchange_id)?;

        let mut symbols = Vec::with_capacity(records.len());
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
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn bitmart_style_data_tickers() {
        let body = r#"{"code":1000,"data":{"tickers":[
            {"symbol":"BTC_USDT","last_price":"50005","base_volume_24h":"120",
             "volume_24h":"120","quote_volume_24h":"6000000","high_24h":"50500","low_24h":"49400"}
        ]}}"#;
        let parser = NestedDataParser::new(vec!["USDT".into()], SymbolFormat::Underscore);
        let tickers = parser.parse_tickers(body.as_bytes(), "bitmart").unwrap();
        assert_eq!(tickers.len(), 1);
        assert_eq!(tickers[0].base_symbol, "BTC");
        assert_eq!(tickers[0].price, dec!(50005));
    }

    #[test]
    fn kucoin_style_data_ticker() {
        let body = r#"{"code":"200000","data":{"time":1700000000,"ticker":[
            {"symbol":"BTC-USDT","last":"50002.5","vol":"300.2","volValue":"15000000",
             "high":"50400","low":"49500","changePrice":"-20.5"}
        ]}}"#;
        let parser = NestedDataParser::new(vec!["USDT".into()], SymbolFormat::Hyphen);
        let tickers = parser.parse_tickers(body.as_bytes(), "kucoin").unwrap();
        assert_eq!(tickers.len(), 1);
        assert_eq!(tickers[0].quote_symbol, "USDT");
        assert_eq!(tickers[0].volume_24h, dec!(300.2));
    }

    #[test]
    fn missing_data_object_is_a_decode_error() {
        let parser = NestedDataParser::new(vec![], SymbolFormat::Concatenated);
        assert!(parser.parse_tickers(br#"{"tickers":[]}"#, "bitmart").is_err());
    }
}
