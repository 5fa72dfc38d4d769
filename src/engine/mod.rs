//! The order lifecycle engine: queues incoming signals, places entries,
//! builds brackets once they fill, reacts to fills by moving stops, and runs
//! the periodic reconciler that keeps local state honest against the
//! exchange's own view of what's open.

mod lifecycle;
mod reconciler;
mod streams;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use dashmap::DashMap;
use parking_lot::Mutex as SyncMutex;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tracing::{error, info, warn};

use crate::config::{RiskConfig, TimingConfig};
use crate::domain::rounding::SymbolFilter;
use crate::domain::Signal;
use crate::exchange::{ExchangeClient, SocketManager};
use crate::notify::{Event, Notifier};
use crate::parser::Registry;
use crate::state::StateStore;

/// Snapshot of engine health, analogous to a liveness probe response.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub open_parent_orders: usize,
    pub tracked_symbols: usize,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// All the collaborators and shared state an `Engine` needs. Built once at
/// startup and handed to `Engine::new`.
pub struct EngineDeps {
    pub exchange: Arc<dyn ExchangeClient>,
    pub sockets: Arc<dyn SocketManager>,
    pub store: Arc<dyn StateStore>,
    pub notifier: Arc<dyn Notifier>,
    pub registry: Registry,
    pub risk: RiskConfig,
    pub timing: TimingConfig,
    /// Build and validate orders normally, but never send `create_order` to
    /// the exchange.
    pub dry_run: bool,
}

pub struct Engine {
    exchange: Arc<dyn ExchangeClient>,
    sockets: Arc<dyn SocketManager>,
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    registry: Registry,
    risk: RiskConfig,
    timing: TimingConfig,
    dry_run: bool,

    filters: DashMap<String, SymbolFilter>,
    prices: Arc<DashMap<String, Decimal>>,
    balance: SyncMutex<Decimal>,

    /// Serializes order-state mutation and exchange order-creation
    /// sequences. Async because critical sections span exchange calls.
    olock: AsyncMutex<()>,
    /// Serializes subscription-set changes and streamer task respawn.
    slock: AsyncMutex<()>,
    /// Handle to the currently-running multiplexed price streamer, if any.
    stream_task: AsyncMutex<Option<tokio::task::JoinHandle<()>>>,

    queue_tx: mpsc::UnboundedSender<Signal>,
    queue_rx: AsyncMutex<Option<mpsc::UnboundedReceiver<Signal>>>,
}

impl Engine {
    /// Construct an engine and fetch initial exchange metadata (symbol
    /// filters, starting balance). Does not start any background tasks;
    /// call [`Engine::run`] for that.
    pub async fn new(deps: EngineDeps) -> Result<Arc<Self>, crate::error::ExchangeError> {
        let filters = DashMap::new();
        for (symbol, filter) in deps.exchange.exchange_info().await? {
            filters.insert(symbol, filter);
        }
        let balance = deps.exchange.account_balance().await?;

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();

        Ok(Arc::new(Self {
            exchange: deps.exchange,
            sockets: deps.sockets,
            store: deps.store,
            notifier: deps.notifier,
            registry: deps.registry,
            risk: deps.risk,
            timing: deps.timing,
            dry_run: deps.dry_run,
            filters,
            prices: Arc::new(DashMap::new()),
            balance: SyncMutex::new(balance),
            olock: AsyncMutex::new(()),
            stream_task: AsyncMutex::new(None),
            slock: AsyncMutex::new(()),
            queue_tx,
            queue_rx: AsyncMutex::new(Some(queue_rx)),
        }))
    }

    /// Decode one raw chat message and route it: a signal joins the
    /// placement queue, a control outcome acts immediately.
    pub async fn handle_text(&self, chat_id: i64, text: &str) {
        match self.registry.get_signal(chat_id, text) {
            crate::parser::ParseOutcome::Signal(signal) => self.queue_signal(signal),
            crate::parser::ParseOutcome::CloseTrade { tag, coin } => {
                self.close_trades(&tag, coin.as_deref()).await;
            }
            crate::parser::ParseOutcome::MoveStopLoss { tag, price } => {
                self.move_stop_loss_for_tag(&tag, price).await;
            }
            crate::parser::ParseOutcome::ModifyTargets { tag, .. } => {
                info!(tag, "modify-targets received; not currently actioned");
            }
            crate::parser::ParseOutcome::NotRecognized => {}
        }
    }

    /// Enqueue a signal for placement. Never blocks.
    pub fn queue_signal(&self, signal: Signal) {
        if self.queue_tx.send(signal).is_err() {
            error!("order queue receiver dropped; signal lost");
        }
    }

    /// Spawn the engine's long-running tasks: queue drainer, user-event
    /// consumer, price-tick consumer, and the periodic reconciler. Runs
    /// until `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let queue_rx = self
            .queue_rx
            .lock()
            .await
            .take()
            .expect("Engine::run called more than once");

        let drainer = {
            let engine = Arc::clone(&self);
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move { engine.drain_queue(queue_rx, &mut shutdown).await })
        };

        let user_events = {
            let engine = Arc::clone(&self);
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move { engine.consume_user_events(&mut shutdown).await })
        };

        let reconciler = {
            let engine = Arc::clone(&self);
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move { engine.run_reconciler(&mut shutdown).await })
        };

        let _ = shutdown.changed().await;
        info!("shutdown signal received, waiting for background tasks");

        for task in [drainer, user_events, reconciler] {
            if let Err(e) = task.await {
                warn!(error = %e, "engine background task panicked");
            }
        }
    }

    async fn drain_queue(
        self: Arc<Self>,
        mut queue_rx: mpsc::UnboundedReceiver<Signal>,
        shutdown: &mut watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => return,
                signal = queue_rx.recv() => {
                    let Some(signal) = signal else { return };
                    self.place_with_retry(signal).await;
                }
            }
        }
    }

    async fn consume_user_events(self: Arc<Self>, shutdown: &mut watch::Receiver<bool>) {
        use futures_util::StreamExt;

        loop {
            let stream = match self.sockets.user_stream().await {
                Ok(stream) => stream,
                Err(e) => {
                    error!(error = %e, "failed to open user stream, retrying in 5s");
                    tokio::time::sleep(StdDuration::from_secs(5)).await;
                    continue;
                }
            };
            tokio::pin!(stream);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => return,
                    event = stream.next() => {
                        match event {
                            Some(event) => self.handle_event(event).await,
                            None => break, // stream ended, reconnect
                        }
                    }
                }
            }
        }
    }

    async fn run_reconciler(self: Arc<Self>, shutdown: &mut watch::Receiver<bool>) {
        let mut interval =
            tokio::time::interval(StdDuration::from_secs(self.timing.reconciler_interval_secs));
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => return,
                _ = interval.tick() => {
                    if let Err(e) = self.reconcile().await {
                        error!(error = %e, "reconciliation sweep failed");
                    }
                }
            }
        }
    }

    #[must_use]
    pub fn health(&self) -> HealthReport {
        let open_parent_orders = self
            .store
            .all_orders()
            .into_iter()
            .filter(|o| o.is_market() || o.is_wait())
            .count();
        HealthReport {
            status: HealthStatus::Healthy,
            open_parent_orders,
            tracked_symbols: self.filters.len(),
            balance: *self.balance.lock(),
        }
    }
}
