// VWAP Engine
// Validates, deduplicates, trims and weight-combines same-pair prices from
// multiple exchanges. Stateless per invocation; all arithmetic is decimal
// with one final 8-decimal quantization.

pub mod service;

pub use service::VwapService;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::types::VwapResult;

/// Hard sanity gates against decimal misplacement in vendor payloads.
const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);
const MAX_VOLUME: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Fractional deviation from the group mean beyond which an entry is trimmed.
const TRIM_THRESHOLD: Decimal = Decimal::from_parts(10, 0, 0, false, 2); // 0.10

/// Emitted prices are quantized to 8 fractional digits, banker's rounding.
const VWAP_SCALE: u32 = 8;

/// One exchange's contribution to a pair group.
#[derive(Debug, Clone)]
pub struct PriceEntry {
    pub exchange_id: String,
    pub price: Decimal,
    pub volume: Decimal,
    pub weight: Decimal,
}

pub struct VwapEngine {
    min_exchanges: usize,
}

impl Default for VwapEngine {
    fn default() -> Self {
        Self { min_exchanges: 2 }
    }
}

impl VwapEngine {
    pub fn new(min_exchanges: usize) -> Self {
        Self {
            min_exchanges: min_exchanges.max(2),
        }
    }

    /// Compute one pair's VWAP. Returns `None` when fewer than the minimum
    /// distinct exchanges survive validation and deduplication.
    pub fn compute_pair(
        &self,
        base_token_id: i32,
        quote_token_id: i32,
        entries: &[PriceEntry],
        timestamp: DateTime<Utc>,
    ) -> Option<VwapResult> {
        let valid = filter_valid(entries);
        if valid.is_empty() {
            return None;
        }

        let deduped = dedupe_per_exchange(valid);
        if deduped.len() < self.min_exchanges {
            return None;
        }

        // Total volume reflects the full deduplicated set, trimmed or not.
        let total_volume: Decimal = deduped.iter().map(|e| e.volume).sum();

        let kept = trim_outliers(&deduped);

        let mut weighted_sum = Decimal::ZERO;
        let mut total_weight = Decimal::ZERO;
        let mut volume_sum = Decimal::ZERO;
        let mut price_volume_sum = Decimal::ZERO;
        for entry in &kept {
            let volume_weight = entry.volume * entry.weight;
            weighted_sum += entry.price * volume_weight;
            total_weight += volume_weight;
            volume_sum += entry.volume;
            price_volume_sum += entry.price * entry.volume;
        }

        let vwap = if !total_weight.is_zero() {
            weighted_sum / total_weight
        } else if !volume_sum.is_zero() {
            price_volume_sum / volume_sum
        } else {
            return None;
        };

        let mut contributing: Vec<String> = kept.iter().map(|e| e.exchange_id.clone()).collect();
        contributing.sort();
        contributing.dedup();

        Some(VwapResult {
            base_token_id,
            quote_token_id,
            vwap_price: vwap.round_dp(VWAP_SCALE),
            total_volume,
            exchange_count: contributing.len(),
            contributing_exchanges: contributing,
            timestamp,
        })
    }
}

fn filter_valid(entries: &[PriceEntry]) -> Vec<PriceEntry> {
    entries
        .iter()
        .filter(|e| {
            e.price > Decimal::ZERO
                && e.volume > Decimal::ZERO
                && e.price < MAX_PRICE
                && e.volume < MAX_VOLUME
        })
        .cloned()
        .collect()
}

/// An exchange reporting the same pair twice keeps its larger-volume entry.
/// Output is sorted by exchange id so downstream sums are deterministic.
fn dedupe_per_exchange(entries: Vec<PriceEntry>) -> Vec<PriceEntry> {
    let mut by_exchange: Vec<PriceEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        match by_exchange
            .iter_mut()
            .find(|e| e.exchange_id == entry.exchange_id)
        {
            Some(existing) => {
                if entry.volume > existing.volume {
                    *existing = entry;
                }
            }
            None => by_exchange.push(entry),
        }
    }
    by_exchange.sort_by(|a, b| a.exchange_id.cmp(&b.exchange_id));
    by_exchange
}

/// Drop entries deviating more than 10% from the arithmetic mean. Needs at
/// least 3 entries; reverts when more than half would be dropped.
fn trim_outliers(entries: &[PriceEntry]) -> Vec<PriceEntry> {
    if entries.len() < 3 {
        return entries.to_vec();
    }

    let count = Decimal::from(entries.len());
    let mean: Decimal = entries.iter().map(|e| e.price).sum::<Decimal>() / count;
    let max_deviation = mean * TRIM_THRESHOLD;

    let kept: Vec<PriceEntry> = entries
        .iter()
        .filter(|e| (e.price - mean).abs() <= max_deviation)
        .cloned()
        .collect();

    let dropped = entries.len() - kept.len();
    if dropped * 2 > entries.len() {
        return entries.to_vec();
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(exchange: &str, price: Decimal, volume: Decimal, weight: Decimal) -> PriceEntry {
        PriceEntry {
            exchange_id: exchange.to_string(),
            price,
            volume,
            weight,
        }
    }

    #[test]
    fn two_exchange_weighted_mean() {
        // S1: identical volume*weight products reduce to the plain mean.
        let engine = VwapEngine::default();
        let entries = vec![
            entry("a", dec!(50000), dec!(10), dec!(0.10)),
            entry("b", dec!(50100), dec!(20), dec!(0.05)),
        ];
        let result = engine
            .compute_pair(1, 2, &entries, Utc::now())
            .expect("result");
        assert_eq!(result.vwap_price, dec!(50050));
        assert_eq!(result.exchange_count, 2);
        assert_eq!(result.total_volume, dec!(30));
        assert_eq!(result.contributing_exchanges, vec!["a", "b"]);
    }

    #[test]
    fn single_exchange_yields_nothing() {
        let engine = VwapEngine::default();
        let entries = vec![entry("a", dec!(100), dec!(5), dec!(0.1))];
        assert!(engine.compute_pair(1, 2, &entries, Utc::now()).is_none());
    }

    #[test]
    fn deviant_third_exchange_is_trimmed() {
        // S2: mean 3168.33, threshold ~316.83, 3500 is out.
        let engine = VwapEngine::default();
        let entries = vec![
            entry("a", dec!(3000), dec!(10), dec!(0.05)),
            entry("b", dec!(3005), dec!(10), dec!(0.05)),
            entry("c", dec!(3500), dec!(10), dec!(0.05)),
        ];
        let result = engine
            .compute_pair(7, 8, &entries, Utc::now())
            .expect("result");
        assert_eq!(result.vwap_price, dec!(3002.5));
        assert_eq!(result.exchange_count, 2);
        // Untrimmed deduplicated volume.
        assert_eq!(result.total_volume, dec!(30));
    }

    #[test]
    fn trim_reverts_when_it_would_drop_majority() {
        // Two tight clusters: trimming would drop 2 of 3.
        let engine = VwapEngine::default();
        let entries = vec![
            entry("a", dec!(100), dec!(1), dec!(0.1)),
            entry("b", dec!(200), dec!(1), dec!(0.1)),
            entry("c", dec!(300), dec!(1), dec!(0.1)),
        ];
        let result = engine
            .compute_pair(1, 2, &entries, Utc::now())
            .expect("result");
        assert_eq!(result.exchange_count, 3);
        assert_eq!(result.vwap_price, dec!(200));
    }

    #[test]
    fn duplicate_exchange_keeps_larger_volume() {
        let engine = VwapEngine::default();
        let entries = vec![
            entry("a", dec!(100), dec!(1), dec!(0.1)),
            entry("a", dec!(110), dec!(5), dec!(0.1)),
            entry("b", dec!(105), dec!(5), dec!(0.1)),
        ];
        let result = engine
            .compute_pair(1, 2, &entries, Utc::now())
            .expect("result");
        assert_eq!(result.exchange_count, 2);
        // a contributes at 110 with volume 5.
        assert_eq!(result.vwap_price, dec!(107.5));
        assert_eq!(result.total_volume, dec!(10));
    }

    #[test]
    fn sanity_gates_drop_misplaced_decimals() {
        let engine = VwapEngine::default();
        let entries = vec![
            entry("a", dec!(1000000), dec!(10), dec!(0.1)),
            entry("b", dec!(100), dec!(10), dec!(0.1)),
            entry("c", dec!(101), dec!(10), dec!(0.1)),
        ];
        let result = engine
            .compute_pair(1, 2, &entries, Utc::now())
            .expect("result");
        assert_eq!(result.exchange_count, 2);
        assert!(result.vwap_price < dec!(1000));
    }

    #[test]
    fn zero_weight_falls_back_to_volume_weighting() {
        let engine = VwapEngine::default();
        let entries = vec![
            entry("a", dec!(100), dec!(10), Decimal::ZERO),
            entry("b", dec!(200), dec!(30), Decimal::ZERO),
        ];
        let result = engine
            .compute_pair(1, 2, &entries, Utc::now())
            .expect("result");
        // (100*10 + 200*30) / 40 = 175
        assert_eq!(result.vwap_price, dec!(175));
    }

    #[test]
    fn output_is_deterministic_for_equal_input() {
        let engine = VwapEngine::default();
        let entries = vec![
            entry("b", dec!(3005.123456789), dec!(13.7), dec!(0.05)),
            entry("a", dec!(3000.987654321), dec!(10.3), dec!(0.10)),
            entry("c", dec!(3002.5), dec!(21.9), dec!(0.07)),
        ];
        let t = Utc::now();
        let first = engine.compute_pair(1, 2, &entries, t).expect("result");
        let second = engine.compute_pair(1, 2, &entries, t).expect("result");
        assert_eq!(first.vwap_price, second.vwap_price);
        assert_eq!(first.contributing_exchanges, second.contributing_exchanges);
        // Quantization is stable: re-rounding changes nothing.
        assert_eq!(first.vwap_price.round_dp(8), first.vwap_price);
    }
}
