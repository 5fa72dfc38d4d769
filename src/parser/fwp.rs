//! Dollar-suffixed multi-target format, with a channel-specific stop-loss
//! label typo ("STOL LOSS") that's tolerated rather than "fixed" upstream.
//!
//! ```text
//! BTC LONG
//! Entry $100
//! Targets $110 $120 $130
//! STOL LOSS $90
//! ```

use crate::domain::Signal;
use crate::parser::util::{detect_side, extract_coin, extract_decimals};
use crate::parser::{ParseOutcome, Parser};

pub struct FwpParser {
    tag: String,
    default_leverage: u32,
}

impl FwpParser {
    #[must_use]
    pub fn new(tag: impl Into<String>, default_leverage: u32) -> Self {
        Self {
            tag: tag.into(),
            default_leverage,
        }
    }
}

impl Parser for FwpParser {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn parse(&self, text: &str) -> ParseOutcome {
        let lines: Vec<&str> = text.lines().collect();
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
                entries = extract_decimals(rest);
            } else if let Some(rest) = upper.strip_prefix("TARGETS") {
                targets = extract_decimals(rest);
            } else if let Some(rest) = upper
                .strip_prefix("STOL LOSS")
                .or_else(|| upper.strip_prefix("STOP LOSS"))
            {
                sl = extract_decimals(rest).first().copied();
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

    fn parser() -> FwpParser {
        FwpParser::new("fwp", 10)
    }

    #[test]
    fn parses_dollar_suffixed_targets_with_typo_label() {
        let text = "BTC LONG\nEntry $100\nTargets $110 $120 $130\nSTOL LOSS $90";
        match parser().parse(text) {
            ParseOutcome::Signal(signal) => {
                assert_eq!(signal.coin, "BTC");
                assert_eq!(signal.entry(), dec!(100));
                assert_eq!(signal.targets(), &[dec!(110), dec!(120), dec!(130)]);
                assert_eq!(signal.sl, Some(dec!(90)));
            }
            other => panic!("expected signal, got {other:?}"),
        }
    }

    #[test]
    fn tolerates_correctly_spelled_stop_loss_too() {
        let text = "ETH SHORT\nEntry $2000\nTargets $1900\nSTOP LOSS $2100";
        match parser().parse(text) {
            ParseOutcome::Signal(signal) => assert_eq!(signal.sl, Some(dec!(2100))),
            other => panic!("expected signal, got {other:?}"),
        }
    }

    #[test]
    fn missing_targets_is_not_recognized() {
        let text = "BTC LONG\nEntry $100";
        assert!(matches!(parser().parse(text), ParseOutcome::NotRecognized));
    }
}
