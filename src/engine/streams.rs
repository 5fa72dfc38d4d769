//! Dynamic price-stream subscription management: a multiset of symbols
//! (duplicates allowed, since closing one position of a symbol must not
//! unsubscribe another open position of the same symbol) drives a single
//! multiplexed WebSocket subscription that's respawned whenever the unique
//! symbol set changes.

use std::time::Duration as StdDuration;

use futures_util::StreamExt;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::domain::rounding::SymbolFilter;
use crate::error::{EngineError, ExchangeError};

use super::Engine;

impl Engine {
    #[must_use]
    pub(super) fn filter_for(&self, symbol: &str) -> Result<SymbolFilter, EngineError> {
        self.filters
            .get(symbol)
            .map(|f| *f)
            .ok_or_else(|| EngineError::Exchange(ExchangeError::UnknownSymbol(symbol.to_string())))
    }

    /// Wait up to `price_wait_retries * price_wait_interval_secs` for a live
    /// price on `coin` to appear.
    pub(super) async fn wait_for_price(&self, coin: &str) -> Option<Decimal> {
        for _ in 0..=self.timing.price_wait_retries {
            if let Some(price) = self.prices.get(coin).map(|p| *p) {
                return Some(price);
            }
            tokio::time::sleep(StdDuration::from_secs(self.timing.price_wait_interval_secs)).await;
        }
        None
    }

    /// Add one membership for `coin` to the subscription multiset and
    /// respawn the streamer if the unique symbol set changed.
    pub(super) async fn subscribe_symbol(&self, coin: String) {
        let _guard = self.slock.lock().await;
        self.store.push_stream(coin);
        self.respawn_streamer_if_changed().await;
    }

    /// Drop one membership for `symbol`. Does not unsubscribe if another
    /// open position still needs the same symbol's price.
    pub(super) fn remove_stream_membership(&self, symbol: &str) {
        let coin = symbol.trim_end_matches("USDT");
        self.store.remove_one_stream(coin);
        // Respawn happens lazily on the next subscribe, or via the
        // reconciler's periodic resync - no exchange call needs this
        // synchronously.
    }

    async fn respawn_streamer_if_changed(&self) {
        let unique: Vec<String> = {
            let mut seen = std::collections::HashSet::new();
            self.store
                .streams()
                .into_iter()
                .filter(|s| seen.insert(s.clone()))
                .collect()
        };

        let mut task_slot = self.stream_task.lock().await;
        if let Some(handle) = task_slot.take() {
            handle.abort();
        }

        if unique.is_empty() {
            return;
        }

        let stream = match self.sockets.price_stream(unique.clone()).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "failed to open price stream");
                return;
            }
        };

        let prices = self.prices.clone();
        let handle = tokio::spawn(async move {
            tokio::pin!(stream);
            while let Some(tick) = stream.next().await {
                debug!(symbol = %tick.symbol, price = %tick.price, "price tick");
                prices.insert(tick.symbol, tick.price);
            }
        });
        *task_slot = Some(handle);
    }
}
