//! Binance USDT-margined futures REST + WebSocket client. The only module
//! in the crate that knows this particular exchange's wire format.

mod client;
mod sign;
mod socket;

pub use client::{BinanceClient, BinanceConfig};
pub use socket::BinanceSocketManager;
