// Vendor symbol splitting and joining.
//
// Splitting prefers, in order: the format's separator, vendor-specific
// transforms (Bitfinex `t` prefix, Kraken asset aliases), longest-suffix
// quote-currency matching, and finally positional fallbacks. Quote lists are
// ordered fiat/stablecoin-first so that length ties peel the fiat leg as the
// quote (`BTCTRY` -> BTC/TRY, never BTCT/RY).

use crate::config::SymbolFormat;

/// Split a vendor symbol into `(base, quote)`. Either side may come back
/// empty when the symbol defies the format; downstream drops those from VWAP
/// while keeping the raw row.
pub fn parse_symbol_pair(raw: &str, format: SymbolFormat, quotes: &[String]) -> (String, String) {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return (String::new(), String::new());
    }

    if let Some(sep) = format.separator() {
        if let Some((base, quote)) = trimmed.split_once(sep) {
            if !base.is_empty() && !quote.is_empty() && !quote.contains(sep) {
                return (base.to_uppercase(), quote.to_uppercase());
            }
        }
    }

    let mut symbol = trimmed.to_string();
    let mut kraken = false;
    match format {
        SymbolFormat::BitfinexT => {
            if let Some(rest) = symbol.strip_prefix('t') {
                symbol = rest.to_string();
            }
        }
        SymbolFormat::Kraken => {
            kraken = true;
            symbol = symbol
                .replace("XXBT", "BTC")
                .replace("ZUSD", "USD")
                .replace("ZEUR", "EUR");
        }
        _ => {}
    }

    let upper = symbol.to_uppercase();

    if let Some((base, quote)) = match_quote_suffix(&upper, quotes) {
        let base = if kraken { strip_kraken_prefix(&base) } else { base };
        return (base, quote);
    }

    // Positional fallbacks.
    if upper.len() == 6 {
        return (upper[..3].to_string(), upper[3..].to_string());
    }
    if upper.len() > 6 {
        let split = upper.len() - 4;
        return (upper[..split].to_string(), upper[split..].to_string());
    }

    (upper, String::new())
}

/// Longest-suffix-first match against the ordered quote list; list order
/// breaks length ties.
fn match_quote_suffix(symbol: &str, quotes: &[String]) -> Option<(String, String)> {
    let mut ordered: Vec<&String> = quotes.iter().collect();
    ordered.sort_by_key(|q| std::cmp::Reverse(q.len()));

    for quote in ordered {
        if symbol.len() > quote.len() && symbol.ends_with(quote.as_str()) {
            let base = symbol[..symbol.len() - quote.len()].to_string();
            return Some((base, quote.clone()));
        }
    }
    None
}

/// Kraken prefixes 3-letter crypto assets with `X` (XXRP, XETH).
fn strip_kraken_prefix(base: &str) -> String {
    if base.len() == 4 && base.starts_with('X') {
        base[1..].to_string()
    } else {
        base.to_string()
    }
}

/// Render `(base, quote)` in a vendor's notation. Inverse of
/// [`parse_symbol_pair`] for quotes present in the exchange's list.
pub fn format_join(base: &str, quote: &str, format: SymbolFormat) -> String {
    let base_u = base.to_uppercase();
    let quote_u = quote.to_uppercase();
    match format {
        SymbolFormat::Concatenated => format!("{base_u}{quote_u}"),
        SymbolFormat::ConcatenatedLower => {
            format!("{}{}", base_u.to_lowercase(), quote_u.to_lowercase())
        }
        SymbolFormat::Hyphen => format!("{base_u}-{quote_u}"),
        SymbolFormat::Underscore => format!("{base_u}_{quote_u}"),
        SymbolFormat::Slash => format!("{base_u}/{quote_u}"),
        SymbolFormat::BitfinexT => format!("t{base_u}{quote_u}"),
        SymbolFormat::Kraken => {
            let b = if base_u == "BTC" {
                "XXBT".to_string()
            } else if base_u.len() == 3 {
                format!("X{base_u}")
            } else {
                base_u
            };
            let q = if matches!(quote_u.as_str(), "USD" | "EUR" | "GBP") {
                format!("Z{quote_u}")
            } else {
                quote_u
            };
            format!("{b}{q}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_quote_currencies;

    fn quotes() -> Vec<String> {
        default_quote_currencies()
    }

    #[test]
    fn separator_formats_split_directly() {
        let q = quotes();
        assert_eq!(
            parse_symbol_pair("BTC-USDT", SymbolFormat::Hyphen, &q),
            ("BTC".to_string(), "USDT".to_string())
        );
        assert_eq!(
            parse_symbol_pair("eth_usd", SymbolFormat::Underscore, &q),
            ("ETH".to_string(), "USD".to_string())
        );
        assert_eq!(
            parse_symbol_pair("SOL/USDC", SymbolFormat::Slash, &q),
            ("SOL".to_string(), "USDC".to_string())
        );
    }

    #[test]
    fn concatenated_matches_longest_suffix_first() {
        let q = quotes();
        // TUSD must win over USD for ABCTUSD.
        assert_eq!(
            parse_symbol_pair("ABCTUSD", SymbolFormat::Concatenated, &q),
            ("ABC".to_string(), "TUSD".to_string())
        );
        assert_eq!(
            parse_symbol_pair("BTCUSDT", SymbolFormat::Concatenated, &q),
            ("BTC".to_string(), "USDT".to_string())
        );
    }

    #[test]
    fn fiat_first_ordering_fixes_btctry() {
        // Exchange lists TRY ahead of BTC; both are 3 characters.
        let q: Vec<String> = ["TRY", "USDT", "USDC", "BTC"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            parse_symbol_pair("BTCTRY", SymbolFormat::Concatenated, &q),
            ("BTC".to_string(), "TRY".to_string())
        );
    }

    #[test]
    fn bitfinex_prefix_is_stripped() {
        let q = quotes();
        assert_eq!(
            parse_symbol_pair("tBTCUSD", SymbolFormat::BitfinexT, &q),
            ("BTC".to_string(), "USD".to_string())
        );
    }

    #[test]
    fn kraken_aliases_are_substituted() {
        let q = quotes();
        assert_eq!(
            parse_symbol_pair("XXBTZUSD", SymbolFormat::Kraken, &q),
            ("BTC".to_string(), "USD".to_string())
        );
        assert_eq!(
            parse_symbol_pair("XXRPZUSD", SymbolFormat::Kraken, &q),
            ("XRP".to_string(), "USD".to_string())
        );
    }

    #[test]
    fn positional_fallbacks() {
        let q: Vec<String> = vec![];
        assert_eq!(
            parse_symbol_pair("AAABBB", SymbolFormat::Concatenated, &q),
            ("AAA".to_string(), "BBB".to_string())
        );
        assert_eq!(
            parse_symbol_pair("LONGSYMBOL", SymbolFormat::Concatenated, &q),
            ("LONGSY".to_string(), "MBOL".to_string())
        );
        assert_eq!(
            parse_symbol_pair("ABC", SymbolFormat::Concatenated, &q),
            ("ABC".to_string(), String::new())
        );
    }

    #[test]
    fn join_then_parse_round_trips_every_format() {
        let q = quotes();
        let formats = [
            SymbolFormat::Concatenated,
            SymbolFormat::ConcatenatedLower,
            SymbolFormat::Hyphen,
            SymbolFormat::Underscore,
            SymbolFormat::Slash,
            SymbolFormat::BitfinexT,
            SymbolFormat::Kraken,
        ];
        for fmt in formats {
            for (base, quote) in [("BTC", "USD"), ("ETH", "USDT"), ("XRP", "EUR"), ("DOGE", "TRY")]
            {
                let joined = format_join(base, quote, fmt);
                assert_eq!(
                    parse_symbol_pair(&joined, fmt, &q),
                    (base.to_string(), quote.to_string()),
                    "format {fmt:?} symbol {joined}"
                );
            }
        }
    }
}
