//! Generic manual/operator-authored signal format.
//!
//! This is the "fallback" channel format: explicit labeled fields, one per
//! line, plus a couple of short control commands. It doubles as the format
//! an operator would type by hand.
//!
//! ```text
//! BTC LONG
//! Entry: 100
//! Targets: 110 120 130
//! SL: 90
//! Leverage: 10
//! Risk: 2
//! Force
//! ```

use rust_decimal::prelude::ToPrimitive;

use crate::domain::Signal;
use crate::parser::util::{detect_side, extract_coin, extract_decimals, parse_decimal};
use crate::parser::{ParseOutcome, Parser};

pub struct ResultsParser {
    tag: String,
    default_leverage: u32,
}

impl ResultsParser {
    #[must_use]
    pub fn new(tag: impl Into<String>, default_leverage: u32) -> Self {
        Self {
            tag: tag.into(),
            default_leverage,
        }
    }
}

impl Parser for ResultsParser {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn parse(&self, text: &str) -> ParseOutcome {
        let upper = text.to_uppercase();

        if let Some(rest) = upper
            .strip_prefix("CANCEL")
            .or_else(|| upper.strip_prefix("CLOSE"))
        {
            let coin = rest.split_whitespace().next().map(extract_coin);
            return ParseOutcome::CloseTrade {
                tag: self.tag.clone(),
                coin,
            };
        }

        let lines: Vec<&str> = text.lines().collect();
        let has_entry_line = lines.iter().any(|l| l.to_uppercase().starts_with("ENTRY"));

        if !has_entry_line {
            if let Some(sl_line) = lines
                .iter()
                .find(|l| l.to_uppercase().trim_start().starts_with("SL"))
            {
                if let Some(price) = extract_decimals(sl_line).first().copied() {
                    return ParseOutcome::MoveStopLoss {
                        tag: self.tag.clone(),
                        price,
                    };
                }
            }
            if let Some(targets_line) = lines
                .iter()
                .find(|l| l.to_uppercase().trim_start().starts_with("TARGET"))
            {
                let targets = extract_decimals(targets_line);
                if !targets.is_empty() {
                    return ParseOutcome::ModifyTargets {
                        tag: self.tag.clone(),
                        targets,
                    };
                }
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
        let mut leverage = self.default_leverage;
        let mut risk = None;
        let mut force = upper.contains("FORCE");

        for line in &lines {
            let upper_line = line.to_uppercase();
            if let Some(rest) = upper_line.strip_prefix("ENTRY") {
                entries = extract_decimals(rest.trim_start_matches(':'));
            } else if let Some(rest) = upper_line.strip_prefix("TARGETS") {
                targets = extract_decimals(rest.trim_start_matches(':'));
            } else if let Some(rest) = upper_line.strip_prefix("SL") {
                sl = extract_decimals(rest.trim_start_matches(':')).first().copied();
            } else if let Some(rest) = upper_line.strip_prefix("LEVERAGE") {
                if let Some(value) = parse_decimal(rest.trim_start_matches(':').trim())
                    .and_then(|d| d.to_u32())
                {
                    leverage = value;
                }
            } else if let Some(rest) = upper_line.strip_prefix("RISK") {
                risk = parse_decimal(rest.trim_start_matches(':').trim());
            } else if upper_line.trim() == "FORCE" {
                force = true;
            }
        }

        if entries.is_empty() || targets.is_empty() {
            return ParseOutcome::NotRecognized;
        }

        match Signal::try_new(
            coin, side, entries, targets, sl, leverage, risk, force, &self.tag,
        ) {
            Ok(signal) => ParseOutcome::Signal(signal),
            Err(_) => ParseOutcome::NotRecognized,
        }
    }
}
