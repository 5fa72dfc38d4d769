//! WebSocket surface for Binance USDT-margined futures: the multiplexed
//! aggregate-trade stream and the authenticated user-data stream.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::error::ExchangeError;
use crate::exchange::{OrderStatus, PriceTick, SocketManager, UserEvent};

use super::client::BinanceConfig;

pub struct BinanceSocketManager {
    config: BinanceConfig,
    http: reqwest::Client,
}

impl BinanceSocketManager {
    #[must_use]
    pub fn new(config: BinanceConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    async fn create_listen_key(&self) -> Result<String, ExchangeError> {
        let url = format!("{}/fapi/v1/listenKey", self.config.rest_base_url);
        #[derive(Deserialize)]
        struct Resp {
            #[serde(rename = "listenKey")]
            listen_key: String,
        }
        let resp: Resp = self
            .http
            .post(url)
            .header("X-MBX-APIKEY", &self.config.api_key)
            .send()
            .await?
            .json()
            .await?;
        Ok(resp.listen_key)
    }

    /// Keeps the listen key alive every 30 minutes, per Binance's
    /// documented 60-minute expiry.
    fn spawn_keepalive(&self, listen_key: String) {
        let url = format!("{}/fapi/v1/listenKey", self.config.rest_base_url);
        let api_key = self.config.api_key.clone();
        let http = self.http.clone();
        tokio::spawn(async move {
            loop {
                sleep(Duration::from_secs(30 * 60)).await;
                let result = http
                    .put(&url)
                    .header("X-MBX-APIKEY", &api_key)
                    .query(&[("listenKey", &listen_key)])
                    .send()
                    .await;
                if let Err(e) = result {
                    warn!(error = %e, "listen key keepalive failed");
                }
            }
        });
    }
}

#[derive(Debug, Deserialize)]
struct AggTradeFrame {
    stream: String,
    data: AggTradeData,
}

#[derive(Debug, Deserialize)]
struct AggTradeData {
    #[serde(rename = "p")]
    price: Decimal,
}

#[async_trait]
impl SocketManager for BinanceSocketManager {
    async fn price_stream(
        &self,
        symbols: Vec<String>,
    ) -> Result<BoxStream<'static, PriceTick>, ExchangeError> {
        let streams = symbols
            .iter()
            .map(|s| format!("{}usdt@aggTrade", s.to_lowercase()))
            .collect::<Vec<_>>()
            .join("/");
        let url = format!("{}/stream?streams={streams}", self.config.ws_base_url);

        let (ws, _) = tokio_tungstenite::connect_async(url).await?;
        let (_, read) = ws.split();

        let stream = read.filter_map(|msg| async move {
            let msg = msg.ok()?;
            let Message::Text(text) = msg else {
                return None;
            };
            let frame: AggTradeFrame = serde_json::from_str(&text).ok()?;
            let symbol = frame
                .stream
                .split('@')
                .next()?
                .trim_end_matches("usdt")
                .to_uppercase();
            Some(PriceTick {
                symbol,
                price: frame.data.price,
            })
        });

        Ok(Box::pin(stream))
    }

    async fn user_stream(&self) -> Result<BoxStream<'static, UserEvent>, ExchangeError> {
        let listen_key = self.create_listen_key().await?;
        self.spawn_keepalive(listen_key.clone());

        let url = format!("{}/ws/{listen_key}", self.config.ws_base_url);
        let (ws, _) = tokio_tungstenite::connect_async(url).await?;
        let (_, read) = ws.split();

        let stream = read.filter_map(|msg| async move {
            let msg = msg.ok()?;
            let Message::Text(text) = msg else {
                return None;
            };
            parse_user_event(&text)
        });

        Ok(Box::pin(stream))
    }
}

fn parse_user_event(text: &str) -> Option<UserEvent> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    match value.get("e")?.as_str()? {
        "ACCOUNT_UPDATE" => {
            let balance = value
                .pointer("/a/B")?
                .as_array()?
                .iter()
                .find(|b| b.get("a").and_then(|a| a.as_str()) == Some("USDT"))?
                .get("wb")?
                .as_str()?
                .parse()
                .ok()?;
            Some(UserEvent::AccountUpdate {
                usdt_balance: balance,
            })
        }
        "ORDER_TRADE_UPDATE" => {
            let order = value.get("o")?;
            let client_order_id = order.get("c")?.as_str()?.to_string();
            let symbol = order.get("s")?.as_str()?.to_string();
            let status = order.get("X")?.as_str()?;
            let status = match status {
                "FILLED" => OrderStatus::Filled,
                "PARTIALLY_FILLED" => OrderStatus::PartiallyFilled,
                "CANCELED" => OrderStatus::Canceled,
                "EXPIRED" => OrderStatus::Expired,
                "REJECTED" => OrderStatus::Rejected,
                _ => OrderStatus::New,
            };
            let fill_price = order
                .get("ap")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok())
                .filter(|p: &Decimal| !p.is_zero());
            Some(UserEvent::OrderTradeUpdate {
                client_order_id,
                symbol,
                status,
                fill_price,
            })
        }
        other => {
            debug!(event_type = other, "ignoring unrecognized user-stream event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_order_trade_update() {
        let raw = r#"{
            "e": "ORDER_TRADE_UPDATE",
            "o": {"c": "mrkt-abc", "s": "BTCUSDT", "X": "FILLED", "ap": "50000.5"}
        }"#;
        match parse_user_event(raw) {
            Some(UserEvent::OrderTradeUpdate {
                client_order_id,
                symbol,
                status,
                fill_price,
            }) => {
                assert_eq!(client_order_id, "mrkt-abc");
                assert_eq!(symbol, "BTCUSDT");
                assert_eq!(status, OrderStatus::Filled);
                assert_eq!(fill_price, Some(Decimal::new(500005, 1)));
            }
            other => panic!("expected order trade update, got {other:?}"),
        }
    }

    #[test]
    fn parses_account_update() {
        let raw = r#"{
            "e": "ACCOUNT_UPDATE",
            "a": {"B": [{"a": "USDT", "wb": "1234.56"}]}
        }"#;
        match parse_user_event(raw) {
            Some(UserEvent::AccountUpdate { usdt_balance }) => {
                assert_eq!(usdt_balance, Decimal::new(123456, 2));
            }
            other => panic!("expected account update, got {other:?}"),
        }
    }

    #[test]
    fn ignores_unrecognized_event_types() {
        let raw = r#"{"e": "MARGIN_CALL"}"#;
        assert!(parse_user_event(raw).is_none());
    }
}
