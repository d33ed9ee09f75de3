// DataPoint construction for the three time-series families.
//
// Token ids ride as tags (series identity); prices are quantized to 8
// fractional digits before the line-protocol float conversion.

use influxdb2::models::DataPoint;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{ConfluenceError, ConfluenceResult};
use crate::exchanges::HealthEvent;
use crate::types::{CanonicalTicker, VwapResult};

fn decimal_f64(value: Decimal) -> f64 {
    value.round_dp(8).to_f64().unwrap_or(0.0)
}

fn nanos(ts: chrono::DateTime<chrono::Utc>) -> i64 {
    ts.timestamp_millis() * 1_000_000
}

/// Raw ticker row; unresolved token ids are stored as 0 for later remapping.
pub fn ticker_datapoint(ticker: &CanonicalTicker) -> ConfluenceResult<DataPoint> {
    DataPoint::builder("price_tickers")
        .tag("exchange_id", &ticker.exchange_id)
        .tag("base_token_id", ticker.base_token_id.to_string())
        .tag("quote_token_id", ticker.quote_token_id.to_string())
        .field("symbol", ticker.raw_symbol.as_str())
        .field("base_symbol", ticker.base_symbol.as_str())
        .field("quote_symbol", ticker.quote_symbol.as_str())
        .field("price", decimal_f64(ticker.price))
        .field("volume_24h", decimal_f64(ticker.volume_24h))
        .field("quote_volume_24h", decimal_f64(ticker.quote_volume_24h))
        .field("high_24h", decimal_f64(ticker.high_24h))
        .field("low_24h", decimal_f64(ticker.low_24h))
        .field("price_change_24h", decimal_f64(ticker.price_change_24h))
        .timestamp(nanos(ticker.timestamp))
        .build()
        .map_err(|e| ConfluenceError::sink_write("tickers", e.to_string()))
}

pub fn vwap_datapoint(result: &VwapResult) -> ConfluenceResult<DataPoint> {
    DataPoint::builder("vwap_prices")
        .tag("base_token_id", result.base_token_id.to_string())
        .tag("quote_token_id", result.quote_token_id.to_string())
        .field("vwap_price", decimal_f64(result.vwap_price))
        .field("total_volume", decimal_f64(result.total_volume))
        .field("exchange_count", result.exchange_count as i64)
        .field(
            "contributing_exchanges",
            result.contributing_exchanges.join(","),
        )
        .timestamp(nanos(result.timestamp))
        .build()
        .map_err(|e| ConfluenceError::sink_write("vwap", e.to_string()))
}

pub fn health_datapoint(event: &HealthEvent) -> ConfluenceResult<DataPoint> {
    let mut builder = DataPoint::builder("exchange_health")
        .tag("exchange_id", &event.exchange_id)
        .field("response_time_ms", event.response_time_ms)
        .field("success", event.success)
        .field("symbols_fetched", event.symbols_fetched as i64);

    if let Some(message) = &event.error_message {
        builder = builder.field("error_message", message.as_str());
    }
    if let Some(status) = event.http_status_code {
        builder = builder.field("http_status_code", status as i64);
    }

    builder
        .timestamp(nanos(event.timestamp))
        .build()
        .map_err(|e| ConfluenceError::sink_write("health", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn ticker_point_builds_with_unresolved_ids() {
        let ticker = CanonicalTicker {
            exchange_id: "binance".into(),
            raw_symbol: "BTCUSDT".into(),
            base_symbol: "BTC".into(),
            quote_symbol: "USDT".into(),
            base_token_id: 0,
            quote_token_id: 0,
            price: dec!(50000.123456789),
            volume_24h: dec!(10),
            quote_volume_24h: dec!(500000),
            high_24h: dec!(51000),
            low_24h: dec!(49000),
            price_change_24h: dec!(-10.5),
            timestamp: Utc::now(),
        };
        assert!(ticker_datapoint(&ticker).is_ok());
    }

    #[test]
    fn vwap_point_preserves_contributors() {
        let result = VwapResult {
            base_token_id: 1,
            quote_token_id: 2,
            vwap_price: dec!(50050),
            total_volume: dec!(30),
            exchange_count: 2,
            contributing_exchanges: vec!["binance".into(), "kraken".into()],
            timestamp: Utc::now(),
        };
        assert!(vwap_datapoint(&result).is_ok());
    }

    #[test]
    fn health_point_handles_optional_fields() {
        let event = HealthEvent {
            exchange_id: "kraken".into(),
            timestamp: Utc::now(),
            response_time_ms: 182.5,
            success: false,
            error_message: Some("timeout".into()),
            http_status_code: None,
            symbols_fetched: 0,
        };
        assert!(health_datapoint(&event).is_ok());
    }
}
