// Binance-style parser: 24h ticker statistics as a top-level array, symbol
// discovery via `exchangeInfo`. MEXC shares the format.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::SymbolFormat;
use crate::error::{ConfluenceError, ConfluenceResult};
use crate::exchanges::symbol_pair::parse_symbol_pair;
use crate::types::{CanonicalTicker, ExchangeSymbol};

use super::{decimal_field, string_field, ResponseParser};

pub struct BinanceParser {
    quotes: Vec<String>,
}

impl BinanceParser {
    pub fn new(quotes: Vec<String>) -> Self {
        Self { quotes }
    }

    fn parse_record(&self, map: &Map<String, Value>, exchange_id: &str) -> Option<CanonicalTicker> {
        let symbol = string_field(map, "symbol")?;
        let (base, quote) = parse_symbol_pair(symbol, SymbolFormat::Concatenated, &self.quotes);
        Some(CanonicalTicker {
            exchange_id: exchange_id.to_string(),
            raw_symbol: symbol.to_string(),
            base_symbol: base,
            quote_symbol: quote,
            base_token_id: 0,
            quote_token_id: 0,
            price: decimal_field(map, "lastPrice"),
            volume_24h: decimal_field(map, "volume"),
            quote_volume_24h: decimal_field(map, "quoteVolume"),
            high_24h: decimal_field(map, "highPrice"),
            low_24h: decimal_field(map, "lowPrice"),
            price_change_24h: decimal_field(map, "priceChange"),
            timestamp: Utc::now(),
        })
    }
}

#[derive(Deserialize)]
struct ExchangeInfo {
    symbols: Vec<ExchangeInfoSymbol>,
}

#[derive(Deserialize)]
struct ExchangeInfoSymbol {
    symbol: String,
    status: String,
    #[serde(rename = "baseAsset")]
    base_asset: String,
    #[serde(rename = "quoteAsset")]
    quote_asset: String,
}

impl ResponseParser for BinanceParser {
    fn parse_tickers(
        &self,
        data: &[u8],
        exchange_id: &str,
    ) -> ConfluenceResult<Vec<CanonicalTicker>> {
        let records: Vec<Map<String, Value>> = serde_json::from_slice(data)
            .map_err(|e| ConfluenceError::response_decode(exchange_id, e.to_string()))?;

        let mut tickers = Vec::with_capacity(records.len());
        for record in &records {
            if let Some(ticker) = self.parse_record(record, exchange_id) {
                if ticker.price.is_sign_positive() && !ticker.price.is_zero() {
                    tickers.push(ticker);
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
        let info: ExchangeInfo = serde_json::from_slice(data)
            .map_err(|e| ConfluenceError::response_decode(exchange_id, e.to_string()))?;

        Ok(info
            .symbols
            .into_iter()
            .filter(|s| s.status == "TRADING")
            .map(|s| ExchangeSymbol {
                exchange_id: exchange_id.to_string(),
                symbol: s.symbol,
                base_symbol: s.base_asset,
                quote_symbol: s.quote_asset,
                is_active: true,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const TICKERS: &str = r#"[
        {"symbol":"BTCUSDT","lastPrice":"50000.00","volume":"1234.5","quoteVolume":"61725000",
         "priceChange":"-120.5","highPrice":"51000","lowPrice":"49500"},
        {"symbol":"DEADUSDT","lastPrice":"0.000","volume":"0","quoteVolume":"0",
         "priceChange":"0","highPrice":"0","lowPrice":"0"}
    ]"#;

    #[test]
    fn parses_array_and_drops_non_positive_price() {
        let parser = BinanceParser::new(vec!["USDT".into(), "USD".into()]);
        let tickers = parser.parse_tickers(TICKERS.as_bytes(), "binance").unwrap();
        assert_eq!(tickers.len(), 1);
        let t = &tickers[0];
        assert_eq!(t.raw_symbol, "BTCUSDT");
        assert_eq!(t.base_symbol, "BTC");
        assert_eq!(t.quote_symbol, "USDT");
        assert_eq!(t.price, dec!(50000.00));
        assert_eq!(t.price_change_24h, dec!(-120.5));
    }

    #[test]
    fn symbols_filter_trading_status() {
        let body = r#"{"symbols":[
            {"symbol":"BTCUSDT","status":"TRADING","baseAsset":"BTC","quoteAsset":"USDT"},
            {"symbol":"OLDUSDT","status":"BREAK","baseAsset":"OLD","quoteAsset":"USDT"}
        ]}"#;
        let parser = BinanceParser::new(vec!["USDT".into()]);
        let symbols = parser.parse_symbols(body.as_bytes(), "binance").unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].base_symbol, "BTC");
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        let parser = BinanceParser::new(vec![]);
        assert!(parser.parse_tickers(b"{not json", "binance").is_err());
    }
}
