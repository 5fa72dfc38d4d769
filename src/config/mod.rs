//! Application configuration: a TOML file for structure, environment
//! variables for secrets.

mod logging;

pub use logging::{LogFormat, LoggingConfig};

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// One registered signal channel: the chat id it's read from, which parser
/// family decodes it, and its per-channel defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    pub chat_id: i64,
    pub parser: ParserKind,
    /// Tag attached to every signal/close/move-sl/modify-targets outcome
    /// this channel produces; also the client-order tag namespace.
    pub tag: String,
    #[serde(default = "default_leverage")]
    pub default_leverage: u32,
}

fn default_leverage() -> u32 {
    10
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    Results,
    Bfp,
    Bps,
    Ccs,
    Fwp,
}

/// Risk and sizing defaults used when a signal doesn't specify its own.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_fraction")]
    pub default_fraction: Decimal,
    #[serde(default = "default_max_fraction")]
    pub max_fraction: Decimal,
}

fn default_fraction() -> Decimal {
    Decimal::new(5, 2) // 0.05
}

fn default_max_fraction() -> Decimal {
    Decimal::new(25, 2) // 0.25
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            default_fraction: default_fraction(),
            max_fraction: default_max_fraction(),
        }
    }
}

/// Timing constants governing placement retries, price-wait, expiry, and
/// the reconciler's sweep period. Defaults match a production deployment of
/// this engine; overriding them is mainly useful for tests.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_wait_order_expiry_secs")]
    pub wait_order_expiry_secs: i64,
    #[serde(default = "default_reconciler_interval_secs")]
    pub reconciler_interval_secs: u64,
    #[serde(default = "default_price_wait_retries")]
    pub price_wait_retries: u32,
    #[serde(default = "default_price_wait_interval_secs")]
    pub price_wait_interval_secs: u64,
    #[serde(default = "default_placement_retries")]
    pub placement_retries: u32,
    #[serde(default = "default_placement_retry_backoff_secs")]
    pub placement_retry_backoff_secs: u64,
}

fn default_wait_order_expiry_secs() -> i64 {
    24 * 60 * 60
}
fn default_reconciler_interval_secs() -> u64 {
    5 * 60
}
fn default_price_wait_retries() -> u32 {
    10
}
fn default_price_wait_interval_secs() -> u64 {
    1
}
fn default_placement_retries() -> u32 {
    3
}
fn default_placement_retry_backoff_secs() -> u64 {
    5
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            wait_order_expiry_secs: default_wait_order_expiry_secs(),
            reconciler_interval_secs: default_reconciler_interval_secs(),
            price_wait_retries: default_price_wait_retries(),
            price_wait_interval_secs: default_price_wait_interval_secs(),
            placement_retries: default_placement_retries(),
            placement_retry_backoff_secs: default_placement_retry_backoff_secs(),
        }
    }
}

/// Exchange connection settings. `api_key`/`api_secret` are never read from
/// the file - always from `BINANCE_API_KEY`/`BINANCE_API_SECRET`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExchangeConfigFile {
    #[serde(default)]
    pub testnet: bool,
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(skip)]
    pub api_secret: Option<String>,
}

/// Outbound Telegram notifier settings. `bot_token` always comes from
/// `TELEGRAM_BOT_TOKEN`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub chat_id: Option<i64>,
    #[serde(skip)]
    pub bot_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub exchange: ExchangeConfigFile,
    #[serde(default)]
    pub telegram: TelegramConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let mut config: Self = toml::from_str(&content).map_err(ConfigError::Parse)?;

        config.exchange.api_key = std::env::var("BINANCE_API_KEY").ok();
        config.exchange.api_secret = std::env::var("BINANCE_API_SECRET").ok();
        if config.telegram.enabled {
            config.telegram.bot_token = std::env::var("TELEGRAM_BOT_TOKEN").ok();
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.exchange.api_key.is_none() {
            return Err(ConfigError::MissingField {
                field: "BINANCE_API_KEY",
            }
            .into());
        }
        if self.exchange.api_secret.is_none() {
            return Err(ConfigError::MissingField {
                field: "BINANCE_API_SECRET",
            }
            .into());
        }
        if self.risk.default_fraction <= Decimal::ZERO || self.risk.default_fraction > Decimal::ONE
        {
            return Err(ConfigError::InvalidValue {
                field: "risk.default_fraction",
                reason: "must be between 0 and 1".to_string(),
            }
            .into());
        }
        if self.risk.max_fraction < self.risk.default_fraction {
            return Err(ConfigError::InvalidValue {
                field: "risk.max_fraction",
                reason: "must be >= default_fraction".to_string(),
            }
            .into());
        }
        if self.timing.reconciler_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timing.reconciler_interval_secs",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.telegram.enabled && self.telegram.bot_token.is_none() {
            return Err(ConfigError::MissingField {
                field: "TELEGRAM_BOT_TOKEN",
            }
            .into());
        }

        let mut seen_chats = std::collections::HashSet::new();
        for channel in &self.channels {
            if !seen_chats.insert(channel.chat_id) {
                return Err(ConfigError::InvalidValue {
                    field: "channels",
                    reason: format!("duplicate chat_id {}", channel.chat_id),
                }
                .into());
            }
        }

        Ok(())
    }

    pub fn init_logging(&self) {
        self.logging.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            channels: vec![],
            risk: RiskConfig::default(),
            timing: TimingConfig::default(),
            exchange: ExchangeConfigFile {
                testnet: true,
                api_key: Some("k".into()),
                api_secret: Some("s".into()),
            },
            telegram: TelegramConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn missing_api_key_fails_validation() {
        let mut config = base_config();
        config.exchange.api_key = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_chat_ids_are_rejected() {
        let mut config = base_config();
        config.channels = vec![
            ChannelConfig {
                chat_id: 1,
                parser: ParserKind::Results,
                tag: "a".into(),
                default_leverage: 10,
            },
            ChannelConfig {
                chat_id: 1,
                parser: ParserKind::Bfp,
                tag: "b".into(),
                default_leverage: 10,
            },
        ];
        assert!(config.validate().is_err());
    }

    #[test]
    fn telegram_enabled_without_token_fails_validation() {
        let mut config = base_config();
        config.telegram.enabled = true;
        config.telegram.bot_token = None;
        assert!(config.validate().is_err());
    }
}
