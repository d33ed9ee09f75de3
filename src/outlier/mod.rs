// Outlier Detector
// Cross-exchange deviation analysis over a short look-back window of latest
// prices. Flags surface mis-mapped symbols, not market anomalies, so only
// low-confidence (`symbol` method) mappings are persisted.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::config::OutlierConfig;
use crate::db::PostgresStore;
use crate::error::ConfluenceResult;
use crate::resolver::SymbolResolver;
use crate::types::{CanonicalTicker, MappingMethod, Outlier, TokenPair};

/// Latest observed price for one exchange on one pair.
#[derive(Debug, Clone)]
pub struct PricePoint {
    pub exchange_id: String,
    pub base_token_id: i32,
    pub quote_token_id: i32,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Rolling latest-price window, fed by the poller with each cycle's resolved
/// tickers. Holds one point per (pair, exchange); stale points are evicted at
/// snapshot time.
#[derive(Debug, Default)]
pub struct PriceWindow {
    points: HashMap<TokenPair, HashMap<String, PricePoint>>,
}

impl PriceWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, ticker: &CanonicalTicker) {
        if !ticker.is_resolved() || ticker.price <= Decimal::ZERO {
            return;
        }
        self.points.entry(ticker.pair()).or_default().insert(
            ticker.exchange_id.clone(),
            PricePoint {
                exchange_id: ticker.exchange_id.clone(),
                base_token_id: ticker.base_token_id,
                quote_token_id: ticker.quote_token_id,
                price: ticker.price,
                timestamp: ticker.timestamp,
            },
        );
    }

    /// Evict points older than the window, then return pairs that still have
    /// at least two exchanges to compare.
    pub fn comparable_groups(
        &mut self,
        now: DateTime<Utc>,
        window: chrono::Duration,
    ) -> Vec<Vec<PricePoint>> {
        let cutoff = now - window;
        self.points.retain(|_, by_exchange| {
            by_exchange.retain(|_, point| point.timestamp >= cutoff);
            !by_exchange.is_empty()
        });

        let mut groups: Vec<Vec<PricePoint>> = self
            .points
            .values()
            .filter(|by_exchange| by_exchange.len() >= 2)
            .map(|by_exchange| {
                let mut points: Vec<PricePoint> = by_exchange.values().cloned().collect();
                points.sort_by(|a, b| a.exchange_id.cmp(&b.exchange_id));
                points
            })
            .collect();
        groups.sort_by_key(|g| (g[0].base_token_id, g[0].quote_token_id));
        groups
    }
}

/// A deviation that exceeded a threshold, before the mapping-method gate.
#[derive(Debug, Clone)]
pub struct DeviationFlag {
    pub point: PricePoint,
    pub average_price: f64,
    pub deviation_percent: f64,
    pub std_deviations: f64,
}

/// Flag entries deviating from the cross-exchange mean by more than
/// `deviation_threshold` (fractional) or `std_dev_multiplier` standard
/// deviations. Statistics are f64; relative values are what matters here.
pub fn detect_deviations(points: &[PricePoint], config: &OutlierConfig) -> Vec<DeviationFlag> {
    if points.len() < 2 {
        return Vec::new();
    }

    let prices: Vec<f64> = points
        .iter()
        .map(|p| p.price.to_f64().unwrap_or(0.0))
        .collect();
    let n = prices.len() as f64;
    let mean = prices.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return Vec::new();
    }
    // Population variance: E[X^2] - mean^2.
    let mean_sq = prices.iter().map(|p| p * p).sum::<f64>() / n;
    let std_dev = (mean_sq - mean * mean).max(0.0).sqrt();

    let mut flags = Vec::new();
    for (point, price) in points.iter().zip(&prices) {
        let deviation = (price - mean).abs();
        let deviation_percent = deviation / mean * 100.0;
        let std_deviations = if std_dev > 0.0 {
            deviation / std_dev
        } else {
            0.0
        };

        if deviation_percent > config.deviation_threshold * 100.0
            || std_deviations > config.std_dev_multiplier
        {
            flags.push(DeviationFlag {
                point: point.clone(),
                average_price: mean,
                deviation_percent,
                std_deviations,
            });
        }
    }
    flags
}

pub struct OutlierDetector {
    config: OutlierConfig,
    resolver: Arc<SymbolResolver>,
    store: Arc<PostgresStore>,
}

impl OutlierDetector {
    pub fn new(
        config: OutlierConfig,
        resolver: Arc<SymbolResolver>,
        store: Arc<PostgresStore>,
    ) -> Self {
        Self {
            config,
            resolver,
            store,
        }
    }

    /// Scan the window once. Failures are reported to the caller for logging
    /// but never block the poll pipeline.
    pub async fn scan(
        &self,
        window: &mut PriceWindow,
        now: DateTime<Utc>,
    ) -> ConfluenceResult<Vec<Outlier>> {
        let lookback = chrono::Duration::seconds(self.config.window_secs as i64);
        let groups = window.comparable_groups(now, lookback);

        let mut outliers = Vec::new();
        for group in &groups {
            for flag in detect_deviations(group, &self.config) {
                // Only low-confidence auto-backfilled mappings are persisted;
                // deviations on verified mappings are market conditions.
                let method = self
                    .resolver
                    .mapping_method(&flag.point.exchange_id, flag.point.base_token_id)
                    .await;
                if method != Some(MappingMethod::Symbol) {
                    debug!(
                        exchange = %flag.point.exchange_id,
                        base = flag.point.base_token_id,
                        quote = flag.point.quote_token_id,
                        deviation_percent = flag.deviation_percent,
                        "deviation on trusted mapping ignored"
                    );
                    continue;
                }

                outliers.push(Outlier {
                    exchange_id: flag.point.exchange_id.clone(),
                    base_token_id: flag.point.base_token_id,
                    quote_token_id: flag.point.quote_token_id,
                    exchange_price: flag.point.price,
                    average_price: Decimal::from_f64_retain(flag.average_price)
                        .unwrap_or(Decimal::ZERO)
                        .round_dp(8),
                    deviation_percent: flag.deviation_percent,
                    std_deviations: flag.std_deviations,
                    mapping_method: MappingMethod::Symbol,
                    detected_at: now,
                    is_resolved: false,
                });
            }
        }

        if !outliers.is_empty() {
            if let Err(e) = self.store.insert_outliers(&outliers).await {
                warn!(error = %e, count = outliers.len(), "failed to persist outliers");
            }
        }

        Ok(outliers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn point(exchange: &str, price: Decimal) -> PricePoint {
        PricePoint {
            exchange_id: exchange.to_string(),
            base_token_id: 1,
            quote_token_id: 2,
            price,
            timestamp: Utc::now(),
        }
    }

    fn config() -> OutlierConfig {
        OutlierConfig::default()
    }

    #[test]
    fn fifty_percent_deviation_is_flagged() {
        // One exchange at 1.00 against four at 0.50: deviation ~66.7%.
        let points = vec![
            point("x", dec!(1.00)),
            point("a", dec!(0.50)),
            point("b", dec!(0.50)),
            point("c", dec!(0.50)),
            point("d", dec!(0.50)),
        ];
        let flags = detect_deviations(&points, &config());
        let x = flags.iter().find(|f| f.point.exchange_id == "x").unwrap();
        assert!((x.deviation_percent - 66.666).abs() < 0.1);
    }

    #[test]
    fn tight_cluster_produces_no_flags() {
        let points = vec![
            point("a", dec!(100.0)),
            point("b", dec!(100.5)),
            point("c", dec!(99.8)),
        ];
        assert!(detect_deviations(&points, &config()).is_empty());
    }

    #[test]
    fn identical_prices_never_divide_by_zero() {
        let points = vec![point("a", dec!(5)), point("b", dec!(5))];
        assert!(detect_deviations(&points, &config()).is_empty());
    }

    #[test]
    fn single_point_groups_are_skipped() {
        assert!(detect_deviations(&[point("a", dec!(5))], &config()).is_empty());
    }

    #[test]
    fn window_keeps_latest_point_per_exchange() {
        let mut window = PriceWindow::new();
        let mut t = crate::types::CanonicalTicker {
            exchange_id: "a".into(),
            raw_symbol: "BTCUSDT".into(),
            base_symbol: "BTC".into(),
            quote_symbol: "USDT".into(),
            base_token_id: 1,
            quote_token_id: 2,
            price: dec!(100),
            volume_24h: dec!(1),
            quote_volume_24h: dec!(0),
            high_24h: dec!(0),
            low_24h: dec!(0),
            price_change_24h: dec!(0),
            timestamp: Utc::now(),
        };
        window.record(&t);
        t.price = dec!(105);
        t.timestamp = Utc::now();
        window.record(&t);
        t.exchange_id = "b".into();
        t.price = dec!(104);
        window.record(&t);

        let groups = window.comparable_groups(Utc::now(), chrono::Duration::seconds(60));
        assert_eq!(groups.len(), 1);
        let a = groups[0].iter().find(|p| p.exchange_id == "a").unwrap();
        assert_eq!(a.price, dec!(105));
    }

    #[test]
    fn stale_points_are_evicted() {
        let mut window = PriceWindow::new();
        let t = crate::types::CanonicalTicker {
            exchange_id: "a".into(),
            raw_symbol: "BTCUSDT".into(),
            base_symbol: "BTC".into(),
            quote_symbol: "USDT".into(),
            base_token_id: 1,
            quote_token_id: 2,
            price: dec!(100),
            volume_24h: dec!(1),
            quote_volume_24h: dec!(0),
            high_24h: dec!(0),
            low_24h: dec!(0),
            price_change_24h: dec!(0),
            timestamp: Utc::now() - chrono::Duration::seconds(120),
        };
        window.record(&t);
        let groups = window.comparable_groups(Utc::now(), chrono::Duration::seconds(60));
        assert!(groups.is_empty());
    }
}
