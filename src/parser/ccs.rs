//! Entry-band signal format with pipe-separated targets.
//!
//! ```text
//! BTC LONG
//! Entries: 100-105
//! Targets: 110|120|130
//! SL: 90
//! ```

use crate::domain::Signal;
use crate::parser::util::{detect_side, extract_coin, extract_decimals};
use crate::parser::{ParseOutcome, Parser};

pub struct CcsParser {
    tag: String,
    default_leverage: u32,
}

impl CcsParser {
    #[must_use]
    pub fn new(tag: impl Into<String>, default_leverage: u32) -> Self {
        Self {
            tag: tag.into(),
            default_leverage,
        }
    }
}

impl Parser for CcsParser {
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
            if let Some(rest) = upper.strip_prefix("ENTRIES").or_else(|| upper.strip_prefix("ENTRY")) {
                entries = parse_band(rest.trim_start_matches(':').trim());
            } else if let Some(rest) = upper.strip_prefix("TARGETS") {
                targets = parse_pipe_separated(rest.trim_start_matches(':').trim());
            } else if let Some(rest) = upper.strip_prefix("SL") {
                sl = extract_decimals(rest.trim_start_matches(':')).first().copied();
            }
        }

        if entries.is_empty() || targets.is_empty() {
            return ParseOutcome::NotRecognized;
        }

        // `parse_band` always returns the band low-to-high; `Signal::try_new`
        // resolves which boundary is `entry` vs `max_entry` for the side.
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

/// `"100-105"` -> `[100, 105]`; a plain single number is a degenerate
/// one-element band.
fn parse_band(text: &str) -> Vec<rust_decimal::Decimal> {
    if let Some((lo, hi)) = text.split_once('-') {
        let mut out = Vec::new();
        if let Some(lo) = crate::parser::util::parse_decimal(lo) {
            out.push(lo);
        }
        if let Some(hi) = crate::parser::util::parse_decimal(hi) {
            out.push(hi);
        }
        out
    } else {
        crate::parser::util::parse_decimal(text)
            .into_iter()
            .collect()
    }
}

fn parse_pipe_separated(text: &str) -> Vec<rust_decimal::Decimal> {
    text.split('|')
        .filter_map(crate::parser::util::parse_decimal)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use rust_decimal_macros::dec;

    fn parser() -> CcsParser {
        CcsParser::new("ccs", 10)
    }

    #[test]
    fn parses_entry_band_and_pipe_targets() {
        let text = "BTC LONG\nEntries: 100-105\nTargets: 110|120|130\nSL: 90";
        match parser().parse(text) {
            ParseOutcome::Signal(signal) => {
                assert_eq!(signal.side, Side::Long);
                assert_eq!(signal.entry(), dec!(100));
                assert_eq!(signal.max_entry(), dec!(105));
                assert_eq!(signal.targets(), &[dec!(110), dec!(120), dec!(130)]);
                assert!(signal.is_wait_entry());
            }
            other => panic!("expected signal, got {other:?}"),
        }
    }

    #[test]
    fn reverses_band_for_short_so_near_entry_is_first() {
        let text = "ETH SHORT\nEntries: 1900-2000\nTargets: 1800|1700\nSL: 2050";
        match parser().parse(text) {
            ParseOutcome::Signal(signal) => {
                assert_eq!(signal.entry(), dec!(2000));
                assert_eq!(signal.max_entry(), dec!(1900));
            }
            other => panic!("expected signal, got {other:?}"),
        }
    }

    #[test]
    fn single_entry_degenerates_to_market() {
        let text = "BTC LONG\nEntries: 100\nTargets: 110|120\nSL: 90";
        match parser().parse(text) {
            ParseOutcome::Signal(signal) => assert!(!signal.is_wait_entry()),
            other => panic!("expected signal, got {other:?}"),
        }
    }
}
