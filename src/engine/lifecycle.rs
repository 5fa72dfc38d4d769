//! Entry placement, bracket creation, and event-driven stop-loss
//! management: the heart of the state machine.

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::domain::order::{ChildRole, ClientOrderId, OrderRecord};
use crate::domain::{Side, Signal};
use crate::error::EngineError;
use crate::exchange::{NewOrder, OrderSide, OrderStatus, OrderType, PlacedOrder, UserEvent};
use crate::notify::Event as NotifyEvent;

use super::Engine;

const MAX_TARGETS: usize = 5;

impl Engine {
    /// Drain-loop entry point: attempt placement, retrying transient
    /// failures a bounded number of times. Duplicate-order rejections are
    /// terminal and are not retried.
    pub(super) async fn place_with_retry(&self, signal: Signal) {
        let mut attempt = 0;
        loop {
            match self.place_order(&signal).await {
                Ok(()) => return,
                Err(EngineError::DuplicateOrder { symbol }) => {
                    warn!(symbol, "duplicate order, dropping signal");
                    return;
                }
                Err(e) if attempt < self.timing.placement_retries => {
                    attempt += 1;
                    warn!(error = %e, attempt, "placement failed, retrying");
                    tokio::time::sleep(StdDuration::from_secs(
                        self.timing.placement_retry_backoff_secs,
                    ))
                    .await;
                }
                Err(e) => {
                    warn!(error = %e, "placement failed after exhausting retries");
                    self.notifier.notify(NotifyEvent::PlacementFailed {
                        tag: signal.tag.clone(),
                        symbol: signal.coin.clone(),
                        reason: e.to_string(),
                    });
                    return;
                }
            }
        }
    }

    /// Send `order` to the exchange, unless `dry_run` is set - then log it
    /// and hand back a synthetic fill-free acknowledgement instead. Every
    /// order placement in this module goes through here so `--dry-run`
    /// actually means what its doc comment promises.
    async fn submit_order(
        &self,
        order: NewOrder,
    ) -> Result<PlacedOrder, crate::error::ExchangeError> {
        if self.dry_run {
            info!(
                client_order_id = %order.client_order_id,
                symbol = %order.symbol,
                order_type = ?order.order_type,
                "dry-run: not sending order to exchange"
            );
            return Ok(PlacedOrder {
                exchange_order_id: 0,
                client_order_id: order.client_order_id,
                status: OrderStatus::New,
            });
        }
        self.exchange.create_order(order).await
    }

    /// Place one entry order for `signal`. Never places a bracket directly -
    /// that happens once the entry fill is observed on the user stream.
    async fn place_order(&self, signal: &Signal) -> Result<(), EngineError> {
        let symbol = format!("{}USDT", signal.coin);

        {
            let _guard = self.olock.lock().await;
            let existing_is_duplicate = self
                .store
                .parent_orders_for_symbol(&symbol)
                .iter()
                .any(|o| o.is_market() || (o.is_wait() && o.has_filled()));
            if existing_is_duplicate {
                return Err(EngineError::DuplicateOrder { symbol });
            }
        }

        self.subscribe_symbol(signal.coin.clone()).await;

        let live_price = self.wait_for_price(&signal.coin).await.ok_or_else(|| {
            EngineError::PriceUnavailable {
                symbol: symbol.clone(),
            }
        })?;

        self.exchange
            .change_leverage(&symbol, signal.leverage)
            .await?;

        let filter = self.filter_for(&symbol)?;
        let balance = *self.balance.lock();

        let signal = signal
            .clone()
            .with_risk_bounds(self.risk.default_fraction, self.risk.max_fraction)
            .autocorrect(live_price);

        let raw_qty = balance * signal.fraction / (live_price / Decimal::from(signal.leverage));
        let qty = filter.round_qty(raw_qty);

        let crossed = match signal.side {
            Side::Long => live_price > signal.max_entry(),
            Side::Short => live_price < signal.max_entry(),
        };
        if crossed {
            return Err(EngineError::EntryCrossed { price: live_price });
        }

        let wait_entry = signal.is_wait_entry()
            && match signal.side {
                Side::Long => live_price < signal.entry(),
                Side::Short => live_price > signal.entry(),
            };

        let role = if wait_entry {
            ChildRole::Wait
        } else {
            ChildRole::Market
        };
        let client_order_id = ClientOrderId::new(role);

        let order = if wait_entry {
            NewOrder {
                symbol: symbol.clone(),
                side: order_side(signal.side),
                order_type: OrderType::Stop,
                quantity: Some(qty),
                price: Some(filter.round_price(signal.max_entry())),
                stop_price: Some(filter.round_price(signal.entry())),
                close_position: false,
                client_order_id: client_order_id.to_string(),
            }
        } else {
            NewOrder {
                symbol: symbol.clone(),
                side: order_side(signal.side),
                order_type: OrderType::Market,
                quantity: Some(qty),
                price: None,
                stop_price: None,
                close_position: false,
                client_order_id: client_order_id.to_string(),
            }
        };

        self.submit_order(order).await?;

        let record = OrderRecord::new(
            client_order_id,
            symbol,
            signal.side,
            qty,
            signal.sl,
            signal.targets().to_vec(),
            signal.fraction,
            signal.leverage,
            signal.tag.clone(),
            Utc::now(),
            Duration::seconds(self.timing.wait_order_expiry_secs),
        );
        self.store.insert_order(record);

        Ok(())
    }

    /// Place the stop-loss first, then up to `MAX_TARGETS` scaling targets,
    /// once the entry has filled.
    pub(super) async fn place_collection_orders(&self, parent_id: &ClientOrderId) {
        let _guard = self.olock.lock().await;
        let Some(parent) = self.store.get_order(parent_id) else {
            warn!(parent = %parent_id, "place_collection_orders: parent not found");
            return;
        };

        let Some(entry) = parent.entry else {
            warn!(parent = %parent_id, "place_collection_orders: parent has no realized entry");
            return;
        };
        let Some(sl) = parent.sl else {
            info!(parent = %parent_id, "no stop-loss configured for this signal, skipping bracket");
            return;
        };

        if let Some(filter) = self.filters.get(&parent.symbol) {
            let stop_id = ClientOrderId::new(ChildRole::Stop);
            let stop_order = NewOrder {
                symbol: parent.symbol.clone(),
                side: opposite_side(parent.side),
                order_type: OrderType::StopMarket,
                quantity: None,
                price: None,
                stop_price: Some(filter.round_price(sl)),
                close_position: true,
                client_order_id: stop_id.to_string(),
            };
            if self.submit_order(stop_order).await.is_ok() {
                self.store.update_order(
                    parent_id,
                    Box::new({
                        let stop_id = stop_id.clone();
                        move |record| record.s_ord = Some(stop_id)
                    }),
                );
            }

            let targets: Vec<Decimal> = parent.targets.iter().take(MAX_TARGETS).copied().collect();
            let mut remaining_qty = parent.qty;
            for (idx, &target) in targets.iter().enumerate() {
                let is_last = idx == targets.len() - 1;
                let target_id = ClientOrderId::new(ChildRole::Target);

                let order = if is_last {
                    NewOrder {
                        symbol: parent.symbol.clone(),
                        side: opposite_side(parent.side),
                        order_type: OrderType::TakeProfitMarket,
                        quantity: None,
                        price: None,
                        stop_price: Some(filter.round_price(target)),
                        close_position: true,
                        client_order_id: target_id.to_string(),
                    }
                } else {
                    let qty = filter.round_qty(remaining_qty / Decimal::TWO);
                    remaining_qty -= qty;
                    NewOrder {
                        symbol: parent.symbol.clone(),
                        side: opposite_side(parent.side),
                        order_type: OrderType::Limit,
                        quantity: Some(qty),
                        price: Some(filter.round_price(target)),
                        stop_price: None,
                        close_position: false,
                        client_order_id: target_id.to_string(),
                    }
                };

                if self.submit_order(order).await.is_ok() {
                    self.store.update_order(
                        parent_id,
                        Box::new({
                            let target_id = target_id.clone();
                            move |record| record.t_ord.push(target_id)
                        }),
                    );
                }
            }

            self.notifier.notify(NotifyEvent::BracketPlaced {
                tag: parent.tag.clone(),
                symbol: parent.symbol.clone(),
                targets: targets.len(),
            });
        }
    }

    /// Dispatch one user-stream event to the appropriate state transition.
    pub(super) async fn handle_event(&self, event: UserEvent) {
        match event {
            UserEvent::AccountUpdate { usdt_balance } => {
                *self.balance.lock() = usdt_balance;
            }
            UserEvent::OrderTradeUpdate {
                client_order_id,
                symbol: _,
                status,
                fill_price,
            } if status == OrderStatus::Filled => {
                self.handle_fill(&client_order_id, fill_price).await;
            }
            UserEvent::OrderTradeUpdate { .. } => {}
        }
    }

    async fn handle_fill(&self, client_order_id: &str, fill_price: Option<Decimal>) {
        let id = ClientOrderId::from(client_order_id.to_string());
        match id.role() {
            Some(ChildRole::Market | ChildRole::Wait) => {
                let guard = self.olock.lock().await;
                let updated = self.store.update_order(
                    &id,
                    Box::new(move |record| {
                        record.entry = fill_price.or(record.entry);
                    }),
                );
                drop(guard);
                if updated {
                    if let Some(record) = self.store.get_order(&id) {
                        self.notifier.notify(NotifyEvent::EntryFilled {
                            tag: record.tag.clone(),
                            symbol: record.symbol.clone(),
                            price: record.entry.unwrap_or_default(),
                        });
                    }
                    self.place_collection_orders(&id).await;
                }
            }
            Some(ChildRole::Stop) => self.handle_stop_fill(&id).await,
            Some(ChildRole::Target) => self.move_stop_loss(&id).await,
            None => {}
        }
    }

    async fn handle_stop_fill(&self, stop_id: &ClientOrderId) {
        let _guard = self.olock.lock().await;
        let Some(parent) = self
            .store
            .all_orders()
            .into_iter()
            .find(|o| o.s_ord.as_ref() == Some(stop_id))
        else {
            return;
        };

        for target in &parent.t_ord {
            let _ = self.exchange.cancel_order(&parent.symbol, target.as_str()).await;
        }
        self.store.remove_order(&parent.id);
        self.remove_stream_membership(&parent.symbol);

        self.notifier.notify(NotifyEvent::PositionClosed {
            tag: parent.tag.clone(),
            symbol: parent.symbol.clone(),
            reason: "stop-loss hit",
        });
    }

    /// A target fill promotes the stop: first target -> break-even, last
    /// target -> the position is already flat, clean up. Anything in
    /// between is a no-op; the stop stays where it is.
    pub(super) async fn move_stop_loss(&self, target_id: &ClientOrderId) {
        let _guard = self.olock.lock().await;
        let Some(parent) = self
            .store
            .all_orders()
            .into_iter()
            .find(|o| o.t_ord.contains(target_id))
        else {
            return;
        };

        if parent.is_last_target(target_id) {
            if let Some(stop_id) = &parent.s_ord {
                let _ = self
                    .exchange
                    .cancel_order(&parent.symbol, stop_id.as_str())
                    .await;
            }
            self.store.remove_order(&parent.id);
            self.remove_stream_membership(&parent.symbol);
            self.notifier.notify(NotifyEvent::PositionClosed {
                tag: parent.tag.clone(),
                symbol: parent.symbol.clone(),
                reason: "final target hit",
            });
            return;
        }

        if parent.is_first_target(target_id) {
            let Some(entry) = parent.entry else { return };
            self.place_sl_order(&parent.id, Some(entry)).await;
            self.notifier.notify(NotifyEvent::StopMoved {
                tag: parent.tag.clone(),
                symbol: parent.symbol.clone(),
                price: entry,
            });
        }
    }

    /// Replace the parent's stop-loss with one at `new_price` (or at its
    /// current price if `new_price` is `None` and none exists yet).
    /// Re-placing over an already-placed stop with no new price is a no-op:
    /// user-stream redelivery on reconnect must not double-place brackets.
    pub(super) async fn place_sl_order(&self, parent_id: &ClientOrderId, new_price: Option<Decimal>) {
        let Some(parent) = self.store.get_order(parent_id) else {
            return;
        };
        if parent.s_ord.is_some() && new_price.is_none() {
            warn!(parent = %parent_id, "place_sl_order called with no new price on an existing stop, ignoring");
            return;
        }

        let Some(filter) = self.filters.get(&parent.symbol).map(|f| *f) else {
            return;
        };
        let price = new_price.or(parent.sl).unwrap_or_default();

        if let Some(old_stop) = &parent.s_ord {
            let _ = self
                .exchange
                .cancel_order(&parent.symbol, old_stop.as_str())
                .await;
        }

        let new_stop_id = ClientOrderId::new(ChildRole::Stop);
        let order = NewOrder {
            symbol: parent.symbol.clone(),
            side: opposite_side(parent.side),
            order_type: OrderType::StopMarket,
            quantity: None,
            price: None,
            stop_price: Some(filter.round_price(price)),
            close_position: true,
            client_order_id: new_stop_id.to_string(),
        };

        if self.submit_order(order).await.is_ok() {
            self.store.update_order(
                parent_id,
                Box::new(move |record| {
                    record.s_ord = Some(new_stop_id);
                    record.sl = Some(price);
                }),
            );
        }
    }

    pub(super) async fn move_stop_loss_for_tag(&self, tag: &str, price: Decimal) {
        let matching: Vec<_> = self
            .store
            .all_orders()
            .into_iter()
            .filter(|o| o.tag == tag)
            .collect();
        for parent in matching {
            self.place_sl_order(&parent.id, Some(price)).await;
        }
    }

    /// Cancel every child and close the position for every parent matching
    /// `tag` (and `coin`, if given).
    pub(super) async fn close_trades(&self, tag: &str, coin: Option<&str>) {
        let _guard = self.olock.lock().await;
        let matching: Vec<_> = self
            .store
            .all_orders()
            .into_iter()
            .filter(|o| {
                o.tag == tag
                    && coin.map_or(true, |c| o.symbol.eq_ignore_ascii_case(&format!("{c}USDT")))
            })
            .collect();

        for parent in matching {
            if let Some(stop) = &parent.s_ord {
                let _ = self.exchange.cancel_order(&parent.symbol, stop.as_str()).await;
            }
            for target in &parent.t_ord {
                let _ = self
                    .exchange
                    .cancel_order(&parent.symbol, target.as_str())
                    .await;
            }

            let close_side = opposite_side(parent.side);
            let close_id = ClientOrderId::new(ChildRole::Market);
            let _ = self
                .submit_order(NewOrder {
                    symbol: parent.symbol.clone(),
                    side: close_side,
                    order_type: OrderType::Market,
                    quantity: None,
                    price: None,
                    stop_price: None,
                    close_position: true,
                    client_order_id: close_id.to_string(),
                })
                .await;

            self.store.remove_order(&parent.id);
            self.remove_stream_membership(&parent.symbol);
            self.notifier.notify(NotifyEvent::PositionClosed {
                tag: parent.tag.clone(),
                symbol: parent.symbol.clone(),
                reason: "closed by operator",
            });
        }
    }
}

fn order_side(side: Side) -> OrderSide {
    match side {
        Side::Long => OrderSide::Buy,
        Side::Short => OrderSide::Sell,
    }
}

fn opposite_side(side: Side) -> OrderSide {
    match side {
        Side::Long => OrderSide::Sell,
        Side::Short => OrderSide::Buy,
    }
}
