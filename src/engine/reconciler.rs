//! Periodic sweep reconciling local order state against the exchange's own
//! open-order view: cancels orphaned children, drops locally-stale
//! children, resyncs the price-stream subscription set, and expires wait
//! entries that never filled.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::order::ChildRole;
use crate::error::ExchangeError;

use super::Engine;

impl Engine {
    pub(super) async fn reconcile(&self) -> Result<(), ExchangeError> {
        let _guard = self.olock.lock().await;

        let open_orders = self.exchange.get_open_orders().await?;
        let open_ids: HashSet<&str> = open_orders
            .iter()
            .map(|o| o.client_order_id.as_str())
            .collect();

        let local = self.store.all_orders();

        // Orphaned children: open on the exchange but whose parent isn't
        // tracked locally. Only children carry no independent state worth
        // preserving, so cancel them outright.
        let known_children: HashSet<&str> = local
            .iter()
            .flat_map(|o| {
                o.t_ord
                    .iter()
                    .map(|t| t.as_str())
                    .chain(o.s_ord.as_ref().map(|s| s.as_str()))
            })
            .collect();

        for open in &open_orders {
            let role = ChildRole::from_client_order_id(&open.client_order_id);
            let is_child = matches!(role, Some(ChildRole::Target | ChildRole::Stop));
            if is_child && !known_children.contains(open.client_order_id.as_str()) {
                info!(
                    client_order_id = %open.client_order_id,
                    "cancelling orphaned child order"
                );
                let _ = self
                    .exchange
                    .cancel_order(&open.symbol, &open.client_order_id)
                    .await;
            }
        }

        // Locally-known children absent from the exchange's open list have
        // either filled or been cancelled out-of-band; drop them. Parent
        // (market/wait) entries are never dropped just for being absent -
        // they may have filled and transitioned into bracket state.
        for order in &local {
            for target in &order.t_ord {
                if !open_ids.contains(target.as_str()) {
                    self.store.update_order(
                        &order.id,
                        Box::new({
                            let target = target.clone();
                            move |record| record.t_ord.retain(|t| t != &target)
                        }),
                    );
                }
            }
            if let Some(stop) = &order.s_ord {
                if !open_ids.contains(stop.as_str()) {
                    self.store.update_order(
                        &order.id,
                        Box::new(|record| record.s_ord = None),
                    );
                }
            }
        }

        self.resync_subscriptions(&open_orders).await;
        self.expire_stale_waits().await;

        Ok(())
    }

    /// Recompute the desired subscription set as exactly the symbols of
    /// currently-open parent entries, and unsubscribe anything else.
    async fn resync_subscriptions(&self, open_orders: &[crate::exchange::OpenOrder]) {
        let desired: HashSet<String> = open_orders
            .iter()
            .filter(|o| {
                matches!(
                    ChildRole::from_client_order_id(&o.client_order_id),
                    Some(ChildRole::Market | ChildRole::Wait)
                )
            })
            .map(|o| o.symbol.trim_end_matches("USDT").to_string())
            .collect();

        let _guard = self.slock.lock().await;
        let current: HashSet<String> = self.store.streams().into_iter().collect();
        for stale in current.difference(&desired) {
            self.store.remove_one_stream(stale);
            self.prices.remove(stale);
        }
        for missing in desired.difference(&current) {
            self.store.push_stream(missing.clone());
        }
    }

    /// Cancel and drop wait-entries that never accumulated a bracket and
    /// have outlived `wait_order_expiry_secs`.
    async fn expire_stale_waits(&self) {
        let now = Utc::now();
        for order in self.store.all_orders() {
            if order.is_wait() && !order.has_filled() && order.is_expired(now) {
                warn!(
                    client_order_id = %order.id,
                    symbol = %order.symbol,
                    "expiring stale wait-entry"
                );
                let _ = self.exchange.cancel_order(&order.symbol, order.id.as_str()).await;
                self.store.remove_order(&order.id);
                self.remove_stream_membership(&order.symbol);
            }
        }
    }
}
