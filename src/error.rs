//! Crate-wide error taxonomy.

use rust_decimal::Decimal;
use thiserror::Error;

/// Configuration-layer failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Domain-level validation failures (signal/order invariants).
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("signal has no entries")]
    NoEntries,

    #[error("signal has no targets")]
    NoTargets,

    #[error("stop-loss {sl} is not on the correct side of entry {entry} for a {side} trade")]
    InvalidStopLoss {
        sl: Decimal,
        entry: Decimal,
        side: &'static str,
    },

    #[error("targets are not monotone in trade direction")]
    TargetsNotMonotone,

    #[error("unknown channel tag: {0}")]
    UnknownChannel(String),
}

/// Errors surfaced by the order lifecycle engine while placing or managing orders.
///
/// Several of these are *control* values rather than hard failures: the original
/// engine this is modeled on used language-level exceptions for the same purpose.
/// Here they are ordinary enum variants the caller matches on.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("an order already exists for {symbol}")]
    DuplicateOrder { symbol: String },

    #[error("no live price available for {symbol}")]
    PriceUnavailable { symbol: String },

    #[error("price {price} has already crossed the acceptable entry band")]
    EntryCrossed { price: Decimal },

    #[error("parent order {parent} not found")]
    UnknownParent { parent: String },

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Transport-level failures from the exchange client / socket manager.
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("exchange rejected request: {0}")]
    Rejected(String),

    #[error("symbol not found in exchange metadata: {0}")]
    UnknownSymbol(String),
}

/// Top-level crate error, used at the binary boundary and anywhere the more
/// specific error enums need to be unified.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
