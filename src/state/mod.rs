//! Abstract persistence surface for order records and stream-subscription
//! membership. The engine only depends on this trait; durability is the
//! embedder's concern. The reconciler is what makes a restart against an
//! empty store safe.

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::domain::order::{ClientOrderId, OrderRecord};

/// CRUD surface the engine needs over locally-tracked order state, plus the
/// symbol multiset backing price-stream subscriptions.
pub trait StateStore: Send + Sync {
    fn insert_order(&self, record: OrderRecord);
    fn get_order(&self, id: &ClientOrderId) -> Option<OrderRecord>;

    /// Mutate an order record in place under the store's internal lock.
    /// Takes a boxed closure (rather than a generic parameter) so the trait
    /// stays object-safe - the engine holds its store as `Arc<dyn StateStore>`.
    fn update_order(&self, id: &ClientOrderId, f: Box<dyn FnOnce(&mut OrderRecord) + Send>)
        -> bool;

    fn remove_order(&self, id: &ClientOrderId) -> Option<OrderRecord>;
    fn all_orders(&self) -> Vec<OrderRecord>;

    /// Orders for a given symbol that are still in parent (market/wait)
    /// form, used by the duplicate-entry guard.
    fn parent_orders_for_symbol(&self, symbol: &str) -> Vec<OrderRecord> {
        self.all_orders()
            .into_iter()
            .filter(|o| o.symbol == symbol)
            .collect()
    }

    /// Append a stream-subscription membership (duplicates intentionally
    /// allowed — closing one position of a symbol must not unsubscribe
    /// another open position of the same symbol).
    fn push_stream(&self, symbol: String);
    fn remove_one_stream(&self, symbol: &str);
    fn streams(&self) -> Vec<String>;
}

/// Default in-process store, sufficient for a single engine instance and
/// for tests. A durable backend implements the same trait.
#[derive(Default)]
pub struct InMemoryStore {
    orders: DashMap<ClientOrderId, OrderRecord>,
    streams: Mutex<Vec<String>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for InMemoryStore {
    fn insert_order(&self, record: OrderRecord) {
        self.orders.insert(record.id.clone(), record);
    }

    fn get_order(&self, id: &ClientOrderId) -> Option<OrderRecord> {
        self.orders.get(id).map(|r| r.clone())
    }

    fn update_order(
        &self,
        id: &ClientOrderId,
        f: Box<dyn FnOnce(&mut OrderRecord) + Send>,
    ) -> bool {
        if let Some(mut entry) = self.orders.get_mut(id) {
            f(&mut entry);
            true
        } else {
            false
        }
    }

    fn remove_order(&self, id: &ClientOrderId) -> Option<OrderRecord> {
        self.orders.remove(id).map(|(_, r)| r)
    }

    fn all_orders(&self) -> Vec<OrderRecord> {
        self.orders.iter().map(|r| r.value().clone()).collect()
    }

    fn push_stream(&self, symbol: String) {
        self.streams.lock().push(symbol);
    }

    fn remove_one_stream(&self, symbol: &str) {
        let mut streams = self.streams.lock();
        if let Some(pos) = streams.iter().position(|s| s == symbol) {
            streams.remove(pos);
        }
    }

    fn streams(&self) -> Vec<String> {
        self.streams.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::ChildRole;
    use crate::domain::Side;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    fn sample(id: ClientOrderId) -> OrderRecord {
        OrderRecord::new(
            id,
            "BTCUSDT",
            Side::Long,
            Decimal::ONE,
            None,
            vec![],
            Decimal::new(5, 2),
            10,
            "test",
            Utc::now(),
            Duration::hours(24),
        )
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let store = InMemoryStore::new();
        let id = ClientOrderId::new(ChildRole::Market);
        store.insert_order(sample(id.clone()));
        assert!(store.get_order(&id).is_some());
    }

    #[test]
    fn update_order_mutates_in_place() {
        let store = InMemoryStore::new();
        let id = ClientOrderId::new(ChildRole::Market);
        store.insert_order(sample(id.clone()));
        let updated = store.update_order(
            &id,
            Box::new(|record| {
                record.entry = Some(Decimal::new(100, 0));
            }),
        );
        assert!(updated);
        assert_eq!(store.get_order(&id).unwrap().entry, Some(Decimal::new(100, 0)));
    }

    #[test]
    fn update_order_returns_false_for_unknown_id() {
        let store = InMemoryStore::new();
        let id = ClientOrderId::new(ChildRole::Market);
        assert!(!store.update_order(&id, Box::new(|_| {})));
    }

    #[test]
    fn remove_order_deletes_and_returns() {
        let store = InMemoryStore::new();
        let id = ClientOrderId::new(ChildRole::Market);
        store.insert_order(sample(id.clone()));
        assert!(store.remove_order(&id).is_some());
        assert!(store.get_order(&id).is_none());
    }

    #[test]
    fn streams_allow_duplicate_membership() {
        let store = InMemoryStore::new();
        store.push_stream("BTC".to_string());
        store.push_stream("BTC".to_string());
        assert_eq!(store.streams(), vec!["BTC", "BTC"]);

        store.remove_one_stream("BTC");
        assert_eq!(store.streams(), vec!["BTC"]);
    }
}
