//! Exchange-facing ports: everything the engine needs from a concrete
//! futures exchange, and nothing more. A real exchange implementation lives
//! behind a feature flag (see [`binance`]); tests use an in-memory fake.

#[cfg(feature = "binance")]
pub mod binance;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use rust_decimal::Decimal;

use crate::domain::rounding::SymbolFilter;
use crate::error::ExchangeError;

/// Order side as the exchange API spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Order types the engine ever places.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopMarket,
    TakeProfitMarket,
}

/// A request to place one order. Not every field is meaningful for every
/// `OrderType` - a `Market` order ignores `price`/`stop_price`, for instance.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub close_position: bool,
    pub client_order_id: String,
}

/// Result of a successful order placement, as echoed back by the exchange.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub exchange_order_id: u64,
    pub client_order_id: String,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    New,
    Filled,
    PartiallyFilled,
    Canceled,
    Rejected,
    Expired,
}

/// A currently-open order, as reported by `get_open_orders`.
#[derive(Debug, Clone)]
pub struct OpenOrder {
    pub client_order_id: String,
    pub symbol: String,
}

/// REST surface the engine depends on. One implementation per supported
/// exchange; the core never reaches for exchange-specific types.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Fetch tick/lot size filters for every tradable symbol.
    async fn exchange_info(&self) -> Result<Vec<(String, SymbolFilter)>, ExchangeError>;

    /// Current USDT wallet balance.
    async fn account_balance(&self) -> Result<Decimal, ExchangeError>;

    async fn change_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExchangeError>;

    async fn create_order(&self, order: NewOrder) -> Result<PlacedOrder, ExchangeError>;

    async fn cancel_order(&self, symbol: &str, client_order_id: &str)
        -> Result<(), ExchangeError>;

    async fn get_open_orders(&self) -> Result<Vec<OpenOrder>, ExchangeError>;
}

/// A single price tick delivered by the multiplexed trade stream.
#[derive(Debug, Clone)]
pub struct PriceTick {
    pub symbol: String,
    pub price: Decimal,
}

/// Account/order events delivered on the authenticated user stream.
#[derive(Debug, Clone)]
pub enum UserEvent {
    AccountUpdate { usdt_balance: Decimal },
    OrderTradeUpdate {
        client_order_id: String,
        symbol: String,
        status: OrderStatus,
        fill_price: Option<Decimal>,
    },
}

/// WebSocket surface the engine depends on.
#[async_trait]
pub trait SocketManager: Send + Sync {
    /// Replace the set of symbols subscribed on the price stream, returning
    /// a fresh stream of ticks for exactly that set.
    async fn price_stream(
        &self,
        symbols: Vec<String>,
    ) -> Result<BoxStream<'static, PriceTick>, ExchangeError>;

    /// The single authenticated user-data stream. Implementations own
    /// keepalive/renewal and silently reconnect on transport failure.
    async fn user_stream(&self) -> Result<BoxStream<'static, UserEvent>, ExchangeError>;
}

#[cfg(any(test, feature = "testkit"))]
pub mod testkit {
    //! An in-memory `ExchangeClient`/`SocketManager` pair for engine tests.

    use std::sync::Arc;

    use futures_util::stream;
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct FakeExchange {
        pub filters: Vec<(String, SymbolFilter)>,
        pub balance: Mutex<Decimal>,
        pub orders: Mutex<Vec<NewOrder>>,
        pub open_orders: Mutex<Vec<OpenOrder>>,
        pub next_id: Mutex<u64>,
        /// Ticks replayed (once, in order) on the next `price_stream` call,
        /// regardless of the requested symbol set - enough for tests that
        /// need `wait_for_price` to resolve without a real WebSocket.
        pub prices: Mutex<Vec<PriceTick>>,
    }

    impl FakeExchange {
        #[must_use]
        pub fn new(balance: Decimal) -> Arc<Self> {
            Arc::new(Self {
                filters: Vec::new(),
                balance: Mutex::new(balance),
                orders: Mutex::new(Vec::new()),
                open_orders: Mutex::new(Vec::new()),
                next_id: Mutex::new(1),
                prices: Mutex::new(Vec::new()),
            })
        }

        /// Seed a price that will be delivered the next time a price stream
        /// is opened for `symbol`.
        pub fn set_price(&self, symbol: impl Into<String>, price: Decimal) {
            self.prices.lock().push(PriceTick {
                symbol: symbol.into(),
                price,
            });
        }
    }

    #[async_trait]
    impl ExchangeClient for FakeExchange {
        async fn exchange_info(&self) -> Result<Vec<(String, SymbolFilter)>, ExchangeError> {
            Ok(self.filters.clone())
        }

        async fn account_balance(&self) -> Result<Decimal, ExchangeError> {
            Ok(*self.balance.lock())
        }

        async fn change_leverage(&self, _symbol: &str, _leverage: u32) -> Result<(), ExchangeError> {
            Ok(())
        }

        async fn create_order(&self, order: NewOrder) -> Result<PlacedOrder, ExchangeError> {
            let mut next_id = self.next_id.lock();
            let id = *next_id;
            *next_id += 1;
            let client_order_id = order.client_order_id.clone();
            let symbol = order.symbol.clone();
            self.orders.lock().push(order);
            self.open_orders.lock().push(OpenOrder {
                client_order_id: client_order_id.clone(),
                symbol,
            });
            Ok(PlacedOrder {
                exchange_order_id: id,
                client_order_id,
                status: OrderStatus::New,
            })
        }

        async fn cancel_order(
            &self,
            _symbol: &str,
            client_order_id: &str,
        ) -> Result<(), ExchangeError> {
            self.open_orders
                .lock()
                .retain(|o| o.client_order_id != client_order_id);
            Ok(())
        }

        async fn get_open_orders(&self) -> Result<Vec<OpenOrder>, ExchangeError> {
            Ok(self.open_orders.lock().clone())
        }
    }

    #[async_trait]
    impl SocketManager for FakeExchange {
        async fn price_stream(
            &self,
            symbols: Vec<String>,
        ) -> Result<BoxStream<'static, PriceTick>, ExchangeError> {
            let ticks: Vec<PriceTick> = self
                .prices
                .lock()
                .iter()
                .filter(|t| symbols.contains(&t.symbol))
                .cloned()
                .collect();
            Ok(Box::pin(stream::iter(ticks)))
        }

        async fn user_stream(&self) -> Result<BoxStream<'static, UserEvent>, ExchangeError> {
            Ok(Box::pin(stream::empty()))
        }
    }

    #[tokio::test]
    async fn fake_exchange_tracks_placed_orders() {
        let exchange = FakeExchange::new(Decimal::new(1000, 0));
        let order = NewOrder {
            symbol: "BTCUSDT".into(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            quantity: Some(Decimal::ONE),
            price: None,
            stop_price: None,
            close_position: false,
            client_order_id: "mrkt-test".into(),
        };
        let placed = exchange.create_order(order).await.unwrap();
        assert_eq!(placed.client_order_id, "mrkt-test");
        assert_eq!(exchange.get_open_orders().await.unwrap().len(), 1);

        exchange.cancel_order("BTCUSDT", "mrkt-test").await.unwrap();
        assert!(exchange.get_open_orders().await.unwrap().is_empty());
    }
}
