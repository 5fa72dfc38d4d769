//! End-to-end tests driving the order lifecycle engine against the
//! in-memory fake exchange: signal parsing through to order placement, the
//! duplicate-entry guard, and the reconciler's orphan-child cleanup.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal_macros::dec;
use tokio::sync::watch;

use signaltrader::config::{RiskConfig, TimingConfig};
use signaltrader::domain::order::{ChildRole, ClientOrderId};
use signaltrader::domain::rounding::SymbolFilter;
use signaltrader::engine::{Engine, EngineDeps};
use signaltrader::exchange::testkit::FakeExchange;
use signaltrader::exchange::{ExchangeClient, OpenOrder, OrderType, SocketManager};
use signaltrader::notify::NoopNotifier;
use signaltrader::parser::{BfpParser, Registry};
use signaltrader::state::InMemoryStore;

const CHAT_ID: i64 = 111;

/// Fast, test-only timing: no placement backoff, a near-immediate price
/// wait, and a reconciler sweep aggressive enough to observe within a test.
fn fast_timing() -> TimingConfig {
    TimingConfig {
        wait_order_expiry_secs: 24 * 60 * 60,
        reconciler_interval_secs: 1,
        price_wait_retries: 5,
        price_wait_interval_secs: 0,
        placement_retries: 0,
        placement_retry_backoff_secs: 0,
    }
}

fn fake_exchange(balance: rust_decimal::Decimal) -> Arc<FakeExchange> {
    Arc::new(FakeExchange {
        filters: vec![(
            "ALICEUSDT".to_string(),
            SymbolFilter::new(dec!(0.0001), dec!(0.1)),
        )],
        balance: Mutex::new(balance),
        orders: Mutex::new(Vec::new()),
        open_orders: Mutex::new(Vec::new()),
        next_id: Mutex::new(1),
        prices: Mutex::new(Vec::new()),
    })
}

fn registry() -> Registry {
    let mut registry = Registry::new();
    registry.register(CHAT_ID, Box::new(BfpParser::new("bfp", 10)));
    registry
}

const ALICE_SIGNAL: &str = "#ALICE/USDT\nLong\nEntry: 0.55\nTargets:\n1) 0.56\n2) 0.57\n3) 0.58\nStop Loss: 0.53\nLeverage: 10x";

#[tokio::test]
async fn signal_places_market_entry_via_fake_exchange() {
    let fake = fake_exchange(dec!(10000));
    fake.set_price("ALICE", dec!(0.55));

    let deps = EngineDeps {
        exchange: Arc::clone(&fake) as Arc<dyn ExchangeClient>,
        sockets: Arc::clone(&fake) as Arc<dyn SocketManager>,
        store: Arc::new(InMemoryStore::new()),
        notifier: Arc::new(NoopNotifier),
        registry: registry(),
        risk: RiskConfig::default(),
        timing: fast_timing(),
        dry_run: false,
    };
    let engine = Engine::new(deps).await.expect("engine construction");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run_task = tokio::spawn(Arc::clone(&engine).run(shutdown_rx));

    engine.handle_text(CHAT_ID, ALICE_SIGNAL).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let _ = shutdown_tx.send(true);
    run_task.await.expect("engine task panicked");

    let orders = fake.orders.lock();
    assert_eq!(orders.len(), 1, "expected exactly one order placed");
    assert_eq!(orders[0].symbol, "ALICEUSDT");
    assert_eq!(orders[0].order_type, OrderType::Market);
}

#[tokio::test]
async fn duplicate_signal_for_open_symbol_is_dropped() {
    let fake = fake_exchange(dec!(10000));
    fake.set_price("ALICE", dec!(0.55));

    let deps = EngineDeps {
        exchange: Arc::clone(&fake) as Arc<dyn ExchangeClient>,
        sockets: Arc::clone(&fake) as Arc<dyn SocketManager>,
        store: Arc::new(InMemoryStore::new()),
        notifier: Arc::new(NoopNotifier),
        registry: registry(),
        risk: RiskConfig::default(),
        timing: fast_timing(),
        dry_run: false,
    };
    let engine = Engine::new(deps).await.expect("engine construction");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run_task = tokio::spawn(Arc::clone(&engine).run(shutdown_rx));

    engine.handle_text(CHAT_ID, ALICE_SIGNAL).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    // The duplicate guard runs before the price wait, so this second signal
    // for the same symbol never even reaches order placement.
    engine.handle_text(CHAT_ID, ALICE_SIGNAL).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let _ = shutdown_tx.send(true);
    run_task.await.expect("engine task panicked");

    assert_eq!(
        fake.orders.lock().len(),
        1,
        "duplicate signal for an already-open symbol must not place a second entry"
    );
}

#[tokio::test]
async fn reconciler_cancels_orphaned_child_orders() {
    let fake = fake_exchange(dec!(10000));
    // An order with a recognized child prefix that was never recorded in
    // local state - the shape the reconciler exists to clean up.
    let orphan_id = ClientOrderId::new(ChildRole::Target);
    fake.open_orders.lock().push(OpenOrder {
        client_order_id: orphan_id.as_str().to_string(),
        symbol: "ALICEUSDT".to_string(),
    });

    let deps = EngineDeps {
        exchange: Arc::clone(&fake) as Arc<dyn ExchangeClient>,
        sockets: Arc::clone(&fake) as Arc<dyn SocketManager>,
        store: Arc::new(InMemoryStore::new()),
        notifier: Arc::new(NoopNotifier),
        registry: registry(),
        risk: RiskConfig::default(),
        timing: fast_timing(),
        dry_run: false,
    };
    let engine = Engine::new(deps).await.expect("engine construction");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run_task = tokio::spawn(Arc::clone(&engine).run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(1300)).await;

    let _ = shutdown_tx.send(true);
    run_task.await.expect("engine task panicked");

    assert!(
        fake.get_open_orders()
            .await
            .expect("open orders")
            .iter()
            .all(|o| o.client_order_id != orphan_id.as_str()),
        "reconciler should have cancelled the orphaned child order"
    );
}

#[tokio::test]
async fn dry_run_never_reaches_the_exchange() {
    let fake = fake_exchange(dec!(10000));
    fake.set_price("ALICE", dec!(0.55));

    let deps = EngineDeps {
        exchange: Arc::clone(&fake) as Arc<dyn ExchangeClient>,
        sockets: Arc::clone(&fake) as Arc<dyn SocketManager>,
        store: Arc::new(InMemoryStore::new()),
        notifier: Arc::new(NoopNotifier),
        registry: registry(),
        risk: RiskConfig::default(),
        timing: fast_timing(),
        dry_run: true,
    };
    let engine = Engine::new(deps).await.expect("engine construction");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let run_task = tokio::spawn(Arc::clone(&engine).run(shutdown_rx));

    engine.handle_text(CHAT_ID, ALICE_SIGNAL).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let _ = shutdown_tx.send(true);
    run_task.await.expect("engine task panicked");

    assert!(
        fake.orders.lock().is_empty(),
        "dry-run must never call create_order on the exchange"
    );
}

#[tokio::test]
async fn health_reports_starting_balance_before_any_orders() {
    let fake = fake_exchange(dec!(5000));
    let deps = EngineDeps {
        exchange: Arc::clone(&fake) as Arc<dyn ExchangeClient>,
        sockets: Arc::clone(&fake) as Arc<dyn SocketManager>,
        store: Arc::new(InMemoryStore::new()),
        notifier: Arc::new(NoopNotifier),
        registry: registry(),
        risk: RiskConfig::default(),
        timing: fast_timing(),
        dry_run: false,
    };
    let engine = Engine::new(deps).await.expect("engine construction");

    let report = engine.health();
    assert_eq!(report.balance, dec!(5000));
    assert_eq!(report.open_parent_orders, 0);
    assert_eq!(report.tracked_symbols, 1);
}
