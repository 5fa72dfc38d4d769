//! signaltrader - turns free-form chat trade signals into managed
//! USDT-margined futures order brackets on a single exchange.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── domain/    # Pure domain types: signals, orders, rounding
//! ├── parser/    # Per-channel text-to-signal decoders
//! ├── exchange/  # Exchange traits + the concrete Binance implementation
//! ├── state/     # Local order-state persistence surface
//! ├── notify/    # Outbound lifecycle notifications
//! ├── engine/    # The order lifecycle engine and its reconciler
//! ├── config/    # Configuration loading and logging setup
//! └── cli/       # Command-line interface
//! ```
//!
//! # Features
//!
//! - `binance` - Concrete exchange client/socket manager (default)
//! - `telegram` - Outbound Telegram lifecycle notifications (default)
//! - `testkit` - In-memory exchange fake, for downstream integration tests
//! - `integration-tests` - Tests that require real exchange credentials

pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod notify;
pub mod parser;
pub mod state;
