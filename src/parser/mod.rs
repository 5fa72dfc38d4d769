//! Per-channel text-to-signal decoders.
//!
//! Each channel publishes trade calls in its own idiosyncratic free-form
//! format. A [`Parser`] turns sanitized text into a [`ParseOutcome`]; the
//! [`Registry`] dispatches incoming `(chat_id, text)` pairs to the parser
//! registered for that chat.

mod bfp;
mod bps;
mod ccs;
mod fwp;
mod results;
mod sanitize;
mod util;

pub use bfp::BfpParser;
pub use bps::BpsParser;
pub use ccs::CcsParser;
pub use fwp::FwpParser;
pub use results::ResultsParser;
pub use sanitize::sanitize;

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::domain::Signal;

/// What a parser decided about one message.
#[derive(Debug, Clone)]
pub enum ParseOutcome {
    /// A fresh trade call.
    Signal(Signal),
    /// "Close out my open positions for this tag/coin."
    CloseTrade { tag: String, coin: Option<String> },
    /// "Move the stop-loss for this tag to a new price."
    MoveStopLoss { tag: String, price: Decimal },
    /// "Replace the remaining targets for this tag."
    ModifyTargets { tag: String, targets: Vec<Decimal> },
    /// The text didn't match this channel's format at all; callers discard
    /// these silently.
    NotRecognized,
}

/// A single channel's decoder. Implementations are pure functions of the
/// sanitized text plus the channel's own tag/default risk parameters, so
/// they're trivially unit-testable from a text fixture.
pub trait Parser: Send + Sync {
    /// Stable identifier used as the signal/close-trade tag and in logs.
    fn tag(&self) -> &str;

    /// Decode one already-sanitized message.
    fn parse(&self, text: &str) -> ParseOutcome;
}

/// Dispatches raw `(chat_id, text)` messages to the parser registered for
/// that chat, applying the shared sanitizer first.
#[derive(Default)]
pub struct Registry {
    parsers: HashMap<i64, Box<dyn Parser>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    pub fn register(&mut self, chat_id: i64, parser: Box<dyn Parser>) {
        self.parsers.insert(chat_id, parser);
    }

    /// Look up the parser for `chat_id`, sanitize `text`, and decode it.
    /// Unregistered chats always yield [`ParseOutcome::NotRecognized`].
    #[must_use]
    pub fn get_signal(&self, chat_id: i64, text: &str) -> ParseOutcome {
        let Some(parser) = self.parsers.get(&chat_id) else {
            return ParseOutcome::NotRecognized;
        };
        parser.parse(&sanitize(text))
    }
}
