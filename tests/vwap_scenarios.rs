// VWAP engine scenarios: weighted combine, outlier trim and its boundary
// behaviors, determinism.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

use confluence::config::VwapConfig;
use confluence::types::CanonicalTicker;
use confluence::vwap::{PriceEntry, VwapEngine, VwapService};

fn entry(exchange: &str, price: Decimal, volume: Decimal, weight: Decimal) -> PriceEntry {
    PriceEntry {
        exchange_id: exchange.to_string(),
        price,
        volume,
        weight,
    }
}

#[test]
fn two_exchange_vwap_matches_hand_calculation() {
    // Exchange A (weight 0.10) at 50000 vol 10, B (weight 0.05) at 50100
    // vol 20: the volume*weight products are equal, so VWAP is the midpoint.
    let engine = VwapEngine::default();
    let entries = vec![
        entry("exchange-a", dec!(50000), dec!(10), dec!(0.10)),
        entry("exchange-b", dec!(50100), dec!(20), dec!(0.05)),
    ];
    let result = engine
        .compute_pair(1, 2, &entries, Utc::now())
        .expect("two exchanges should produce a result");

    assert_eq!(result.vwap_price, dec!(50050));
    assert_eq!(result.vwap_price.round_dp(8), result.vwap_price);
    assert_eq!(result.exchange_count, 2);
    assert_eq!(
        result.contributing_exchanges,
        vec!["exchange-a".to_string(), "exchange-b".to_string()]
    );
}

#[test]
fn ten_percent_outlier_is_trimmed_from_three() {
    // 3000, 3005, 3500: mean 3168.33, threshold 316.83 -> 3500 trimmed.
    let engine = VwapEngine::default();
    let entries = vec![
        entry("a", dec!(3000), dec!(10), dec!(0.05)),
        entry("b", dec!(3005), dec!(10), dec!(0.05)),
        entry("c", dec!(3500), dec!(10), dec!(0.05)),
    ];
    let result = engine.compute_pair(10, 20, &entries, Utc::now()).unwrap();
    assert_eq!(result.vwap_price, dec!(3002.5));
    assert_eq!(result.exchange_count, 2);
    assert!(!result.contributing_exchanges.contains(&"c".to_string()));
    // Total volume counts the deduplicated set before trimming.
    assert_eq!(result.total_volume, dec!(30));
}

#[test]
fn exactly_two_exchanges_disable_trimming() {
    // A wild 30% spread between two entries still combines: trim needs >= 3.
    let engine = VwapEngine::default();
    let entries = vec![
        entry("a", dec!(100), dec!(10), dec!(0.1)),
        entry("b", dec!(130), dec!(10), dec!(0.1)),
    ];
    let result = engine.compute_pair(1, 2, &entries, Utc::now()).unwrap();
    assert_eq!(result.exchange_count, 2);
    assert_eq!(result.vwap_price, dec!(115));
}

#[test]
fn trim_that_would_drop_majority_reverts() {
    let engine = VwapEngine::default();
    let entries = vec![
        entry("a", dec!(100), dec!(1), dec!(0.1)),
        entry("b", dec!(200), dec!(1), dec!(0.1)),
        entry("c", dec!(300), dec!(1), dec!(0.1)),
    ];
    let result = engine.compute_pair(1, 2, &entries, Utc::now()).unwrap();
    assert_eq!(result.exchange_count, 3);
}

#[test]
fn fewer_than_two_exchanges_yield_nothing() {
    let engine = VwapEngine::default();
    assert!(engine
        .compute_pair(1, 2, &[entry("a", dec!(10), dec!(1), dec!(0.1))], Utc::now())
        .is_none());
    assert!(engine.compute_pair(1, 2, &[], Utc::now()).is_none());
}

#[test]
fn negative_and_zero_prices_never_contribute() {
    let engine = VwapEngine::default();
    let entries = vec![
        entry("a", dec!(0), dec!(10), dec!(0.1)),
        entry("b", dec!(-5), dec!(10), dec!(0.1)),
        entry("c", dec!(100), dec!(10), dec!(0.1)),
    ];
    // Only one valid entry remains; below the exchange minimum.
    assert!(engine.compute_pair(1, 2, &entries, Utc::now()).is_none());
}

#[test]
fn byte_identical_output_for_equal_input() {
    let config = VwapConfig {
        min_exchanges: 2,
        min_volume: 0,
    };
    let mut weights = HashMap::new();
    weights.insert("a".to_string(), dec!(0.10));
    weights.insert("b".to_string(), dec!(0.07));
    weights.insert("c".to_string(), dec!(0.05));
    let service = VwapService::new(&config, weights);

    let now = Utc::now();
    let mk = |exchange: &str, base: i32, price: Decimal, volume: Decimal| CanonicalTicker {
        exchange_id: exchange.to_string(),
        raw_symbol: "PAIR".to_string(),
        base_symbol: "PAIR".to_string(),
        quote_symbol: "USDT".to_string(),
        base_token_id: base,
        quote_token_id: 9,
        price,
        volume_24h: volume,
        quote_volume_24h: Decimal::ZERO,
        high_24h: Decimal::ZERO,
        low_24h: Decimal::ZERO,
        price_change_24h: Decimal::ZERO,
        timestamp: now,
    };

    let tickers = vec![
        mk("c", 1, dec!(3000.123456789), dec!(17.3)),
        mk("a", 1, dec!(3001.987654321), dec!(11.1)),
        mk("b", 1, dec!(2999.5), dec!(23.9)),
        mk("a", 2, dec!(0.00001234), dec!(1000000)),
        mk("b", 2, dec!(0.00001239), dec!(2000000)),
    ];

    let first = service.compute(&tickers, now);
    let second = service.compute(&tickers, now);

    assert_eq!(first.len(), 2);
    let render = |results: &[confluence::types::VwapResult]| {
        results
            .iter()
            .map(|r| {
                format!(
                    "{}/{} {} {} {:?}",
                    r.base_token_id,
                    r.quote_token_id,
                    r.vwap_price,
                    r.total_volume,
                    r.contributing_exchanges
                )
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(render(&first), render(&second));

    for result in &first {
        assert!(result.vwap_price > Decimal::ZERO);
        assert!(result.exchange_count >= 2);
        assert_eq!(result.vwap_price.round_dp(8), result.vwap_price);
    }
}
