//! Numbered-list signal format.
//!
//! ```text
//! #BLZ/USDT
//! LONG
//! Entry: 28390
//! Targets:
//! 1) 28500
//! 2) 28700
//! 3) 29000
//! Stop Loss: 26970
//! Leverage: 10x
//! ```

use crate::domain::Signal;
use crate::parser::util::{detect_side, extract_coin, extract_decimals};
use crate::parser::{ParseOutcome, Parser};

pub struct BfpParser {
    tag: String,
    default_leverage: u32,
}

impl BfpParser {
    #[must_use]
    pub fn new(tag: impl Into<String>, default_leverage: u32) -> Self {
        Self {
            tag: tag.into(),
            default_leverage,
        }
    }
}

impl Parser for BfpParser {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn parse(&self, text: &str) -> ParseOutcome {
        let lines: Vec<&str> = text.lines().collect();
        let Some(header) = lines.first() else {
            return ParseOutcome::NotRecognized;
        };
        if !header.trim_start().starts_with('#') {
            return ParseOutcome::NotRecognized;
        }
        let coin = extract_coin(header);
        if coin.is_empty() {
            return ParseOutcome::NotRecognized;
        }

        let Some(side) = lines.get(1).and_then(|l| detect_side(l)) else {
            return ParseOutcome::NotRecognized;
        };

        let mut entries = Vec::new();
        let mut targets = Vec::new();
        let mut sl = None;
        let mut leverage = self.default_leverage;

        for line in &lines[2..] {
            let upper = line.to_uppercase();
            if let Some(rest) = upper.strip_prefix("ENTRY") {
                entries = extract_decimals(rest.trim_start_matches(':'));
            } else if upper.trim() == "TARGETS:" || upper.trim() == "TARGETS" {
                continue;
            } else if let Some(rest) = upper.strip_prefix("STOP LOSS") {
                sl = extract_decimals(rest.trim_start_matches(':')).first().copied();
            } else if let Some(rest) = upper.strip_prefix("LEVERAGE") {
                let digits: String = rest.chars().filter(char::is_ascii_digit).collect();
                if let Ok(value) = digits.parse() {
                    leverage = value;
                }
            } else if let Some(rest) = numbered_list_item(line) {
                if let Some(value) = extract_decimals(rest).first().copied() {
                    targets.push(value);
                }
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
            leverage,
            None,
            false,
            &self.tag,
        ) {
            Ok(signal) => ParseOutcome::Signal(signal),
            Err(_) => ParseOutcome::NotRecognized,
        }
    }
}

/// `"1) 28500"` -> `Some("28500")`
fn numbered_list_item(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let digits_end = trimmed.find(|c: char| !c.is_ascii_digit())?;
    if digits_end == 0 {
        return None;
    }
    let rest = &trimmed[digits_end..];
    rest.strip_prefix(')').map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use rust_decimal_macros::dec;

    fn parser() -> BfpParser {
        BfpParser::new("bfp", 10)
    }

    #[test]
    fn parses_numbered_target_list() {
        let text = "#ALICE/USDT\nLong\nEntry: 0.55\nTargets:\n1) 0.56\n2) 0.57\n3) 0.58\nStop Loss: 0.53\nLeverage: 10x";
        match parser().parse(text) {
            ParseOutcome::Signal(signal) => {
                assert_eq!(signal.coin, "ALICE");
                assert_eq!(signal.side, Side::Long);
                assert_eq!(signal.entry(), dec!(0.55));
                assert_eq!(signal.targets(), &[dec!(0.56), dec!(0.57), dec!(0.58)]);
                assert_eq!(signal.sl, Some(dec!(0.53)));
                assert_eq!(signal.leverage, 10);
            }
            other => panic!("expected signal, got {other:?}"),
        }
    }

    #[test]
    fn autocorrects_differing_magnitude_quote() {
        let text =
            "#BLZ/USDT\nLong\nEntry: 28390\nTargets:\n1) 28500\n2) 28700\n3) 29000\nStop Loss: 26970";
        let signal = match parser().parse(text) {
            ParseOutcome::Signal(signal) => signal,
            other => panic!("expected signal, got {other:?}"),
        };
        let corrected = signal.autocorrect(dec!(0.02839));
        assert_eq!(corrected.entry(), dec!(0.02839));
        assert_eq!(corrected.sl, Some(dec!(0.02697)));
    }

    #[test]
    fn missing_hash_header_is_not_recognized() {
        assert!(matches!(
            parser().parse("ALICE/USDT\nLong\nEntry: 0.55"),
            ParseOutcome::NotRecognized
        ));
    }
}
