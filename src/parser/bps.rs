//! Reply-quote signal/close format.
//!
//! Fresh calls look like any plain entry/targets/stop-loss message; a
//! *close* is sent as a reply quoting the original call (rendered here as a
//! leading `>` block) followed by a short instruction line.
//!
//! ```text
//! BTC LONG
//! Entry: 100
//! Targets: 110 120
//! SL: 90
//! ```
//!
//! ```text
//! > BTC LONG
//! > Entry: 100
//! Close this trade
//! ```

use crate::domain::Signal;
use crate::parser::util::{detect_side, extract_coin, extract_decimals};
use crate::parser::{ParseOutcome, Parser};

pub struct BpsParser {
    tag: String,
    default_leverage: u32,
}

impl BpsParser {
    #[must_use]
    pub fn new(tag: impl Into<String>, default_leverage: u32) -> Self {
        Self {
            tag: tag.into(),
            default_leverage,
        }
    }
}

impl Parser for BpsParser {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn parse(&self, text: &str) -> ParseOutcome {
        let lines: Vec<&str> = text.lines().collect();
        let is_reply = lines.iter().any(|l| l.trim_start().starts_with('>'));

        if is_reply {
            let quoted_coin = lines
                .iter()
                .filter(|l| l.trim_start().starts_with('>'))
                .find_map(|l| {
                    let stripped = l.trim_start_matches('>').trim();
                    detect_side(stripped).map(|_| extract_coin(stripped.split_whitespace().next()?))
                });
            let instruction = lines
                .iter()
                .find(|l| !l.trim_start().starts_with('>'))
                .copied()
                .unwrap_or_default()
                .to_uppercase();
            if instruction.contains("CLOSE") {
                return ParseOutcome::CloseTrade {
                    tag: self.tag.clone(),
                    coin: quoted_coin,
                };
            }
            return ParseOutcome::NotRecognized;
        }

        let Some(header) = lines.first() else {
            return ParseOutcome::NotRecognized;
        };
        let Some(side) = detect_side(header) else {
            return ParseOutcome::NotRecognized;
        };
        let coin = header
            .split_whitespace()
            .next()
            .map(extract_coin)
            .unwrap_or_default();
        if coin.is_empty() {
            return ParseOutcome::NotRecognized;
        }

        let mut entries = Vec::new();
        let mut targets = Vec::new();
        let mut sl = None;

        for line in &lines[1..] {
            let upper = line.to_uppercase();
            if let Some(rest) = upper.strip_prefix("ENTRY") {
                entries = extract_decimals(rest.trim_start_matches(':'));
            } else if let Some(rest) = upper.strip_prefix("TARGETS") {
                targets = extract_decimals(rest.trim_start_matches(':'));
            } else if let Some(rest) = upper.strip_prefix("SL") {
                sl = extract_decimals(rest.trim_start_matches(':')).first().copied();
            }
        }

        if entries.is_empty() || targets.is_empty() {
            return ParseOutcome::NotRecognized;
        }

        match Signal::try_new(
            coin,
            side,
            entries,
            targets,
            sl,
            self.default_leverage,
            None,
            false,
            &self.tag,
        ) {
            Ok(signal) => ParseOutcome::Signal(signal),
            Err(_) => ParseOutcome::NotRecognized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn parser() -> BpsParser {
        BpsParser::new("bps", 10)
    }

    #[test]
    fn parses_fresh_signal() {
        let text = "BTC LONG\nEntry: 100\nTargets: 110 120\nSL: 90";
        match parser().parse(text) {
            ParseOutcome::Signal(signal) => assert_eq!(signal.coin, "BTC"),
            other => panic!("expected signal, got {other:?}"),
        }
    }

    #[test]
    fn parses_reply_quote_close() {
        let text = "> BTC LONG\n> Entry: 100\nClose this trade";
        match parser().parse(text) {
            ParseOutcome::CloseTrade { coin, .. } => assert_eq!(coin.as_deref(), Some("BTC")),
            other => panic!("expected close-trade, got {other:?}"),
        }
    }

    #[test]
    fn reply_without_close_keyword_is_not_recognized() {
        let text = "> BTC LONG\n> Entry: 100\nnice call";
        assert!(matches!(parser().parse(text), ParseOutcome::NotRecognized));
    }

    #[test]
    fn reply_quote_close_without_sl_tolerates_missing_stop() {
        let text = "> ETH SHORT\nClose";
        match parser().parse(text) {
            ParseOutcome::CloseTrade { coin, .. } => assert_eq!(coin.as_deref(), Some("ETH")),
            other => panic!("expected close-trade, got {other:?}"),
        }
    }

    #[test]
    fn verifies_decimal_entry_parses() {
        assert_eq!(extract_decimals_helper("SL: 90"), vec![dec!(90)]);
    }

    fn extract_decimals_helper(line: &str) -> Vec<rust_decimal::Decimal> {
        crate::parser::util::extract_decimals(line)
    }
}
