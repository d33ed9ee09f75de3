// Groups resolved tickers by token pair and runs the engine over each group.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::config::{default_exchange_weight, VwapConfig};
use crate::types::{CanonicalTicker, VwapResult};

use super::{PriceEntry, VwapEngine};

pub struct VwapService {
    engine: VwapEngine,
    /// Static per-exchange weights from the descriptor file.
    weights: HashMap<String, Decimal>,
    min_volume: Decimal,
}

impl VwapService {
    pub fn new(config: &VwapConfig, weights: HashMap<String, Decimal>) -> Self {
        Self {
            engine: VwapEngine::new(config.min_exchanges),
            weights,
            min_volume: Decimal::from(config.min_volume),
        }
    }

    fn weight_for(&self, exchange_id: &str) -> Decimal {
        self.weights
            .get(exchange_id)
            .copied()
            .unwrap_or_else(|| default_exchange_weight(exchange_id))
    }

    /// One VWAP result per resolved pair with enough contributing exchanges.
    /// Group iteration is ordered so equal input yields identical output.
    pub fn compute(&self, tickers: &[CanonicalTicker], timestamp: DateTime<Utc>) -> Vec<VwapResult> {
        let mut groups: BTreeMap<(i32, i32), Vec<PriceEntry>> = BTreeMap::new();

        for ticker in tickers {
            if !ticker.is_resolved() {
                continue;
            }
            if ticker.volume_24h < self.min_volume {
                continue;
            }
            groups
                .entry((ticker.base_token_id, ticker.quote_token_id))
                .or_default()
                .push(PriceEntry {
                    exchange_id: ticker.exchange_id.clone(),
                    price: ticker.price,
                    volume: ticker.volume_24h,
                    weight: self.weight_for(&ticker.exchange_id),
                });
        }

        let group_count = groups.len();
        let mut results = Vec::with_capacity(group_count);
        for ((base, quote), entries) in groups {
            if let Some(result) = self.engine.compute_pair(base, quote, &entries, timestamp) {
                results.push(result);
            }
        }

        debug!(
            pairs = group_count,
            emitted = results.len(),
            "vwap computation finished"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ticker(
        exchange: &str,
        base: i32,
        quote: i32,
        price: Decimal,
        volume: Decimal,
    ) -> CanonicalTicker {
        CanonicalTicker {
            exchange_id: exchange.to_string(),
            raw_symbol: "BTC-USDT".to_string(),
            base_symbol: "BTC".to_string(),
            quote_symbol: "USDT".to_string(),
            base_token_id: base,
            quote_token_id: quote,
            price,
            volume_24h: volume,
            quote_volume_24h: Decimal::ZERO,
            high_24h: Decimal::ZERO,
            low_24h: Decimal::ZERO,
            price_change_24h: Decimal::ZERO,
            timestamp: Utc::now(),
        }
    }

    fn service(min_volume: u64) -> VwapService {
        let config = VwapConfig {
            min_exchanges: 2,
            min_volume,
        };
        let mut weights = HashMap::new();
        weights.insert("a".to_string(), dec!(0.10));
        weights.insert("b".to_string(), dec!(0.05));
        VwapService::new(&config, weights)
    }

    #[test]
    fn emits_at_most_one_result_per_pair() {
        let svc = service(0);
        let tickers = vec![
            ticker("a", 1, 2, dec!(50000), dec!(10)),
            ticker("b", 1, 2, dec!(50100), dec!(20)),
            ticker("a", 3, 2, dec!(3000), dec!(5)),
        ];
        let results = svc.compute(&tickers, Utc::now());
        // Pair (3,2) has a single exchange and is skipped.
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].base_token_id, 1);
        assert_eq!(results[0].vwap_price, dec!(50050));
    }

    #[test]
    fn unresolved_tickers_never_reach_the_engine() {
        let svc = service(0);
        let mut unresolved = ticker("a", 0, 2, dec!(50000), dec!(10));
        unresolved.base_token_id = 0;
        let tickers = vec![unresolved, ticker("b", 1, 2, dec!(50100), dec!(20))];
        assert!(svc.compute(&tickers, Utc::now()).is_empty());
    }

    #[test]
    fn minimum_volume_gate_applies() {
        let svc = service(1000);
        let tickers = vec![
            ticker("a", 1, 2, dec!(50000), dec!(10)),
            ticker("b", 1, 2, dec!(50100), dec!(2000)),
        ];
        // Exchange a is below the volume floor; only one contributor remains.
        assert!(svc.compute(&tickers, Utc::now()).is_empty());
    }
}
