//! Small parsing helpers shared across channel parsers (number extraction,
//! direction-keyword detection). Not part of the public API.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::domain::Side;

/// Parse a decimal token, tolerating a leading `$`, trailing `%`, and commas
/// used as thousands separators.
#[must_use]
pub fn parse_decimal(token: &str) -> Option<Decimal> {
    let cleaned: String = token
        .trim()
        .trim_start_matches('$')
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    Decimal::from_str(&cleaned).ok()
}

/// Pull every decimal-looking token out of a line, in order.
#[must_use]
pub fn extract_decimals(line: &str) -> Vec<Decimal> {
    line.split(|c: char| c.is_whitespace() || c == '|')
        .filter_map(parse_decimal)
        .collect()
}

/// Detect LONG/SHORT/BUY/SELL keywords, case-insensitively.
#[must_use]
pub fn detect_side(text: &str) -> Option<Side> {
    let upper = text.to_uppercase();
    if upper.contains("LONG") || upper.contains("BUY") {
        Some(Side::Long)
    } else if upper.contains("SHORT") || upper.contains("SELL") {
        Some(Side::Short)
    } else {
        None
    }
}

/// Extract a bare coin ticker from a line like `#BTC/USDT` or `BTCUSDT` or
/// `BTC`, stripping common separators and the quote asset suffix.
#[must_use]
pub fn extract_coin(token: &str) -> String {
    let mut coin = token
        .trim()
        .trim_start_matches('#')
        .trim_start_matches('$')
        .to_uppercase();
    for quote in ["USDT", "/USDT", "-USDT", "USD"] {
        if let Some(stripped) = coin.strip_suffix(quote) {
            coin = stripped.to_string();
            break;
        }
    }
    coin
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parse_decimal_strips_dollar_and_percent() {
        assert_eq!(parse_decimal("$100.5"), Some(dec!(100.5)));
        assert_eq!(parse_decimal("2.5%"), Some(dec!(2.5)));
    }

    #[test]
    fn parse_decimal_strips_thousands_commas() {
        assert_eq!(parse_decimal("28,390"), Some(dec!(28390)));
    }

    #[test]
    fn extract_decimals_pulls_all_numeric_tokens() {
        assert_eq!(
            extract_decimals("targets: 100 105 | 110"),
            vec![dec!(100), dec!(105), dec!(110)]
        );
    }

    #[test]
    fn detect_side_matches_keywords() {
        assert_eq!(detect_side("BTC LONG entry 100"), Some(Side::Long));
        assert_eq!(detect_side("short blz"), Some(Side::Short));
        assert_eq!(detect_side("no direction here"), None);
    }

    #[test]
    fn extract_coin_strips_hash_and_quote_suffix() {
        assert_eq!(extract_coin("#BTC/USDT"), "BTC");
        assert_eq!(extract_coin("ethusdt"), "ETH");
        assert_eq!(extract_coin("BLZ"), "BLZ");
    }
}
