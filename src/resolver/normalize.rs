// Symbol normalization for the last-resort token lookup.
//
// Vendor prefixes (Kraken `X`, Bitfinex `t`) are stripped and `XBT` aliased
// to `BTC`. The plain uppercase form is tried before the stripped form so
// legitimate X-leading tickers (XRP, XLM) resolve without a seeded mapping.

/// Candidate normalized forms, most specific first, deduplicated.
pub fn normalize_candidates(symbol: &str) -> Vec<String> {
    let trimmed = symbol.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let mut candidates = Vec::with_capacity(2);

    let upper = trimmed.to_uppercase();
    candidates.push(alias(&upper));

    let stripped = strip_vendor_prefix(trimmed);
    let stripped_upper = alias(&stripped.to_uppercase());
    if !candidates.contains(&stripped_upper) {
        candidates.push(stripped_upper);
    }

    candidates
}

fn strip_vendor_prefix(symbol: &str) -> String {
    if let Some(rest) = symbol.strip_prefix('t') {
        if !rest.is_empty() {
            return rest.to_string();
        }
    }
    let upper = symbol.to_uppercase();
    for prefix in ["X", "XX"] {
        if upper.len() > prefix.len() {
            if let Some(rest) = upper.strip_prefix(prefix) {
                return rest.to_string();
            }
        }
    }
    upper
}

fn alias(symbol: &str) -> String {
    match symbol {
        "XBT" => "BTC".to_string(),
        _ => symbol.to_string(),
    }
}
