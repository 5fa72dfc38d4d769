//! REST client for Binance USDT-margined futures.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::rounding::SymbolFilter;
use crate::error::ExchangeError;
use crate::exchange::{
    ExchangeClient, NewOrder, OpenOrder, OrderSide, OrderStatus, OrderType, PlacedOrder,
};

use super::sign::sign_query;

/// Connection details for a single Binance futures account.
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    pub api_key: String,
    pub api_secret: String,
    pub rest_base_url: String,
    pub ws_base_url: String,
}

impl BinanceConfig {
    #[must_use]
    pub fn mainnet(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
            rest_base_url: "https://fapi.binance.com".to_string(),
            ws_base_url: "wss://fstream.binance.com".to_string(),
        }
    }

    #[must_use]
    pub fn testnet(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
            rest_base_url: "https://testnet.binancefuture.com".to_string(),
            ws_base_url: "wss://stream.binancefuture.com".to_string(),
        }
    }
}

pub struct BinanceClient {
    config: BinanceConfig,
    http: reqwest::Client,
}

impl BinanceClient {
    #[must_use]
    pub fn new(config: BinanceConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn timestamp_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Build `k=v&k=v...timestamp=...`, sign it, append the signature.
    fn signed_query(&self, mut params: Vec<(&str, String)>) -> String {
        params.push(("timestamp", Self::timestamp_ms().to_string()));
        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let signature = sign_query(&self.config.api_secret, &query);
        format!("{query}&signature={signature}")
    }

    async fn send_signed(
        &self,
        method: reqwest::Method,
        path: &str,
        params: Vec<(&str, String)>,
    ) -> Result<serde_json::Value, ExchangeError> {
        let query = self.signed_query(params);
        let url = format!("{}{}?{}", self.config.rest_base_url, path, query);
        let response = self
            .http
            .request(method, url)
            .header("X-MBX-APIKEY", &self.config.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Rejected(body));
        }
        Ok(response.json().await?)
    }

    fn order_type_str(order_type: OrderType) -> &'static str {
        match order_type {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
            OrderType::Stop => "STOP",
            OrderType::StopMarket => "STOP_MARKET",
            OrderType::TakeProfitMarket => "TAKE_PROFIT_MARKET",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeInfoResponse {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    filters: Vec<FilterEntry>,
}

#[derive(Debug, Deserialize)]
struct FilterEntry {
    #[serde(rename = "filterType")]
    filter_type: String,
    #[serde(rename = "tickSize")]
    tick_size: Option<Decimal>,
    #[serde(rename = "minQty")]
    min_qty: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct BalanceEntry {
    asset: String,
    balance: Decimal,
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    async fn exchange_info(&self) -> Result<Vec<(String, SymbolFilter)>, ExchangeError> {
        let url = format!("{}/fapi/v1/exchangeInfo", self.config.rest_base_url);
        let response: ExchangeInfoResponse = self.http.get(url).send().await?.json().await?;

        let mut out = Vec::with_capacity(response.symbols.len());
        for symbol in response.symbols {
            let mut tick_size = Decimal::new(1, 1);
            let mut min_qty = Decimal::new(1, 3);
            for filter in symbol.filters {
                match filter.filter_type.as_str() {
                    "PRICE_FILTER" => {
                        if let Some(t) = filter.tick_size {
                            tick_size = t;
                        }
                    }
                    "LOT_SIZE" => {
                        if let Some(q) = filter.min_qty {
                            min_qty = q;
                        }
                    }
                    _ => {}
                }
            }
            out.push((symbol.symbol, SymbolFilter::new(tick_size, min_qty)));
        }
        Ok(out)
    }

    async fn account_balance(&self) -> Result<Decimal, ExchangeError> {
        let body = self
            .send_signed(reqwest::Method::GET, "/fapi/v2/balance", vec![])
            .await?;
        let entries: Vec<BalanceEntry> = serde_json::from_value(body)?;
        Ok(entries
            .into_iter()
            .find(|e| e.asset == "USDT")
            .map(|e| e.balance)
            .unwrap_or(Decimal::ZERO))
    }

    async fn change_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExchangeError> {
        self.send_signed(
            reqwest::Method::POST,
            "/fapi/v1/leverage",
            vec![
                ("symbol", symbol.to_string()),
                ("leverage", leverage.to_string()),
            ],
        )
        .await?;
        Ok(())
    }

    async fn create_order(&self, order: NewOrder) -> Result<PlacedOrder, ExchangeError> {
        let mut params = vec![
            ("symbol", order.symbol.clone()),
            (
                "side",
                match order.side {
                    OrderSide::Buy => "BUY".to_string(),
                    OrderSide::Sell => "SELL".to_string(),
                },
            ),
            ("type", Self::order_type_str(order.order_type).to_string()),
            ("newClientOrderId", order.client_order_id.clone()),
        ];
        if let Some(qty) = order.quantity {
            params.push(("quantity", qty.to_string()));
        }
        if let Some(price) = order.price {
            params.push(("price", price.to_string()));
            params.push(("timeInForce", "GTC".to_string()));
        }
        if let Some(stop_price) = order.stop_price {
            params.push(("stopPrice", stop_price.to_string()));
        }
        if order.close_position {
            params.push(("closePosition", "true".to_string()));
        }

        let body = self
            .send_signed(reqwest::Method::POST, "/fapi/v1/order", params)
            .await?;

        let order_id = body
            .get("orderId")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0);
        let status = body
            .get("status")
            .and_then(serde_json::Value::as_str)
            .map(parse_status)
            .unwrap_or(OrderStatus::New);

        Ok(PlacedOrder {
            exchange_order_id: order_id,
            client_order_id: order.client_order_id,
            status,
        })
    }

    async fn cancel_order(
        &self,
        symbol: &str,
        client_order_id: &str,
    ) -> Result<(), ExchangeError> {
        self.send_signed(
            reqwest::Method::DELETE,
            "/fapi/v1/order",
            vec![
                ("symbol", symbol.to_string()),
                ("origClientOrderId", client_order_id.to_string()),
            ],
        )
        .await?;
        Ok(())
    }

    async fn get_open_orders(&self) -> Result<Vec<OpenOrder>, ExchangeError> {
        let body = self
            .send_signed(reqwest::Method::GET, "/fapi/v1/openOrders", vec![])
            .await?;
        let raw: Vec<HashMap<String, serde_json::Value>> = serde_json::from_value(body)?;
        Ok(raw
            .into_iter()
            .filter_map(|entry| {
                let client_order_id = entry.get("clientOrderId")?.as_str()?.to_string();
                let symbol = entry.get("symbol")?.as_str()?.to_string();
                Some(OpenOrder {
                    client_order_id,
                    symbol,
                })
            })
            .collect())
    }
}

fn parse_status(raw: &str) -> OrderStatus {
    match raw {
        "FILLED" => OrderStatus::Filled,
        "PARTIALLY_FILLED" => OrderStatus::PartiallyFilled,
        "CANCELED" => OrderStatus::Canceled,
        "REJECTED" => OrderStatus::Rejected,
        "EXPIRED" => OrderStatus::Expired,
        _ => OrderStatus::New,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_type_strings_match_binance_enum_values() {
        assert_eq!(BinanceClient::order_type_str(OrderType::Market), "MARKET");
        assert_eq!(
            BinanceClient::order_type_str(OrderType::TakeProfitMarket),
            "TAKE_PROFIT_MARKET"
        );
    }

    #[test]
    fn parse_status_maps_known_values() {
        assert_eq!(parse_status("FILLED"), OrderStatus::Filled);
        assert_eq!(parse_status("NEW"), OrderStatus::New);
        assert_eq!(parse_status("CANCELED"), OrderStatus::Canceled);
    }

    #[test]
    fn testnet_and_mainnet_configs_point_at_different_hosts() {
        let main = BinanceConfig::mainnet("k".into(), "s".into());
        let test = BinanceConfig::testnet("k".into(), "s".into());
        assert_ne!(main.rest_base_url, test.rest_base_url);
    }
}
