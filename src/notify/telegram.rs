//! Telegram-backed notifier. Outbound only - there is no command handler
//! here, unlike the teacher's Telegram integration; the signal-listener bot
//! is a separate process this crate never runs.

use teloxide::prelude::*;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::{Event, Notifier};

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: i64,
}

impl TelegramConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").ok()?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID").ok()?.parse().ok()?;
        Some(Self { bot_token, chat_id })
    }
}

pub struct TelegramNotifier {
    sender: mpsc::UnboundedSender<Event>,
}

impl TelegramNotifier {
    #[must_use]
    pub fn new(config: TelegramConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(worker(config, receiver));
        Self { sender }
    }
}

impl Notifier for TelegramNotifier {
    fn notify(&self, event: Event) {
        if self.sender.send(event).is_err() {
            warn!("Telegram notifier channel closed");
        }
    }
}

async fn worker(config: TelegramConfig, mut receiver: mpsc::UnboundedReceiver<Event>) {
    let bot = Bot::new(&config.bot_token);
    let chat_id = ChatId(config.chat_id);

    info!(chat_id = config.chat_id, "Telegram notifier started");

    while let Some(event) = receiver.recv().await {
        let text = format_event(&event);
        if let Err(e) = bot.send_message(chat_id, text).await {
            error!(error = %e, "failed to send Telegram message");
        }
    }

    warn!("Telegram notifier worker shutting down");
}

fn format_event(event: &Event) -> String {
    match event {
        Event::EntryFilled { tag, symbol, price } => {
            format!("[{tag}] {symbol} entry filled @ {price}")
        }
        Event::BracketPlaced {
            tag,
            symbol,
            targets,
        } => format!("[{tag}] {symbol} bracket placed ({targets} targets + stop-loss)"),
        Event::StopMoved { tag, symbol, price } => {
            format!("[{tag}] {symbol} stop-loss moved to {price}")
        }
        Event::PositionClosed {
            tag,
            symbol,
            reason,
        } => format!("[{tag}] {symbol} closed ({reason})"),
        Event::PlacementFailed {
            tag,
            symbol,
            reason,
        } => format!("[{tag}] {symbol} placement failed: {reason}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn formats_entry_filled_event() {
        let text = format_event(&Event::EntryFilled {
            tag: "bfp".into(),
            symbol: "BTCUSDT".into(),
            price: Decimal::new(50000, 0),
        });
        assert!(text.contains("BTCUSDT"));
        assert!(text.contains("entry filled"));
    }

    #[test]
    fn formats_placement_failed_event() {
        let text = format_event(&Event::PlacementFailed {
            tag: "bfp".into(),
            symbol: "BTCUSDT".into(),
            reason: "price unavailable".into(),
        });
        assert!(text.contains("placement failed"));
    }
}
