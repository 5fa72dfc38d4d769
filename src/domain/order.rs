//! Order records tracked locally for the lifetime of a position, and the
//! client-order-id scheme that lets the engine infer an order's role without
//! a lookup.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::signal::Side;

/// Role encoded in a client order id's prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildRole {
    /// Immediate (market) entry.
    Market,
    /// Conditional (stop-limit band) entry.
    Wait,
    /// Take-profit child.
    Target,
    /// Stop-loss child.
    Stop,
}

impl ChildRole {
    const fn prefix(self) -> &'static str {
        match self {
            Self::Market => "mrkt-",
            Self::Wait => "wait-",
            Self::Target => "trgt-",
            Self::Stop => "stop-",
        }
    }

    /// Infer a role from a client order id, if it carries a recognized prefix.
    #[must_use]
    pub fn from_client_order_id(id: &str) -> Option<Self> {
        for role in [Self::Market, Self::Wait, Self::Target, Self::Stop] {
            if id.starts_with(role.prefix()) {
                return Some(role);
            }
        }
        None
    }
}

/// A client order id: `<role-prefix><uuid-v4>`, globally unique and
/// self-describing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    #[must_use]
    pub fn new(role: ChildRole) -> Self {
        Self(format!("{}{}", role.prefix(), Uuid::new_v4()))
    }

    #[must_use]
    pub fn role(&self) -> Option<ChildRole> {
        ChildRole::from_client_order_id(&self.0)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClientOrderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A parent (entry) order and the bracket built around it once it fills.
#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub id: ClientOrderId,
    pub symbol: String,
    pub side: Side,
    pub qty: Decimal,
    /// Realized entry price, populated once the entry fills.
    pub entry: Option<Decimal>,
    pub sl: Option<Decimal>,
    pub targets: Vec<Decimal>,
    pub fraction: Decimal,
    pub leverage: u32,
    pub tag: String,
    pub expires_at: DateTime<Utc>,
    /// Child target order ids, in placement order.
    pub t_ord: Vec<ClientOrderId>,
    /// Child stop-loss order id, if one has been placed.
    pub s_ord: Option<ClientOrderId>,
}

impl OrderRecord {
    #[must_use]
    pub fn new(
        id: ClientOrderId,
        symbol: impl Into<String>,
        side: Side,
        qty: Decimal,
        sl: Option<Decimal>,
        targets: Vec<Decimal>,
        fraction: Decimal,
        leverage: u32,
        tag: impl Into<String>,
        now: DateTime<Utc>,
        expiry: Duration,
    ) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            side,
            qty,
            entry: None,
            sl,
            targets,
            fraction,
            leverage,
            tag: tag.into(),
            expires_at: now + expiry,
            t_ord: Vec::new(),
            s_ord: None,
        }
    }

    #[must_use]
    pub fn is_market(&self) -> bool {
        self.id.role() == Some(ChildRole::Market)
    }

    #[must_use]
    pub fn is_wait(&self) -> bool {
        self.id.role() == Some(ChildRole::Wait)
    }

    /// A wait order is considered "filled" (live, bracket placed) once it has
    /// a stop-loss child registered.
    #[must_use]
    pub fn has_filled(&self) -> bool {
        self.s_ord.is_some()
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Position of `child` in `t_ord`, used to decide break-even-vs-close on
    /// a target fill.
    #[must_use]
    pub fn target_position(&self, child: &ClientOrderId) -> Option<usize> {
        self.t_ord.iter().position(|id| id == child)
    }

    #[must_use]
    pub fn is_last_target(&self, child: &ClientOrderId) -> bool {
        self.t_ord.last() == Some(child)
    }

    #[must_use]
    pub fn is_first_target(&self, child: &ClientOrderId) -> bool {
        self.t_ord.first() == Some(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_order_id_roundtrips_role() {
        let id = ClientOrderId::new(ChildRole::Target);
        assert_eq!(id.role(), Some(ChildRole::Target));
        assert!(id.as_str().starts_with("trgt-"));
    }

    #[test]
    fn unprefixed_id_has_no_role() {
        let id = ClientOrderId::from("not-a-known-prefix-123".to_string());
        assert_eq!(id.role(), None);
    }

    fn sample_record() -> OrderRecord {
        OrderRecord::new(
            ClientOrderId::new(ChildRole::Market),
            "BTCUSDT",
            Side::Long,
            rust_decimal::Decimal::ONE,
            None,
            vec![],
            rust_decimal::Decimal::new(5, 2),
            10,
            "test",
            Utc::now(),
            Duration::hours(24),
        )
    }

    #[test]
    fn new_record_has_no_brackets_yet() {
        let record = sample_record();
        assert!(record.t_ord.is_empty());
        assert!(record.s_ord.is_none());
        assert!(!record.has_filled());
    }

    #[test]
    fn is_market_detects_prefix() {
        assert!(sample_record().is_market());
    }

    #[test]
    fn target_position_tracks_break_even_boundaries() {
        let mut record = sample_record();
        let t1 = ClientOrderId::new(ChildRole::Target);
        let t2 = ClientOrderId::new(ChildRole::Target);
        let t3 = ClientOrderId::new(ChildRole::Target);
        record.t_ord = vec![t1.clone(), t2.clone(), t3.clone()];

        assert!(record.is_first_target(&t1));
        assert!(!record.is_last_target(&t1));
        assert!(!record.is_first_target(&t2));
        assert!(!record.is_last_target(&t2));
        assert!(record.is_last_target(&t3));
        assert_eq!(record.target_position(&t2), Some(1));
    }

    #[test]
    fn is_expired_respects_expiry() {
        let record = OrderRecord::new(
            ClientOrderId::new(ChildRole::Wait),
            "BTCUSDT",
            Side::Long,
            rust_decimal::Decimal::ONE,
            None,
            vec![],
            rust_decimal::Decimal::new(5, 2),
            10,
            "test",
            Utc::now() - Duration::hours(25),
            Duration::hours(24),
        );
        assert!(record.is_expired(Utc::now()));
    }
}
