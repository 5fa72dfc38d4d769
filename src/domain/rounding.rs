//! Snap prices and quantities to an exchange symbol's tick/lot grid.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Per-symbol grid metadata pulled from exchange info (`PRICE_FILTER`/`LOT_SIZE`).
#[derive(Debug, Clone, Copy)]
pub struct SymbolFilter {
    pub tick_size: Decimal,
    pub min_qty: Decimal,
}

impl SymbolFilter {
    #[must_use]
    pub const fn new(tick_size: Decimal, min_qty: Decimal) -> Self {
        Self { tick_size, min_qty }
    }

    /// Number of decimal places implied by a grid step, e.g. `0.001` -> 3.
    fn decimals_for(step: Decimal) -> u32 {
        if step <= Decimal::ZERO {
            return 0;
        }
        let mut decimals = 0u32;
        let mut value = step;
        // step is always a power of ten fraction (e.g. 0.1, 0.01, 0.001) on a
        // real exchange symbol filter, so repeated *10 terminates quickly.
        while value < Decimal::ONE && decimals < 12 {
            value *= Decimal::from(10);
            decimals += 1;
        }
        decimals
    }

    #[must_use]
    pub fn round_price(&self, price: Decimal) -> Decimal {
        let decimals = Self::decimals_for(self.tick_size);
        price.round_dp_with_strategy(decimals, RoundingStrategy::MidpointNearestEven)
    }

    #[must_use]
    pub fn round_qty(&self, qty: Decimal) -> Decimal {
        let decimals = Self::decimals_for(self.min_qty);
        let rounded = qty.round_dp_with_strategy(decimals, RoundingStrategy::ToZero);
        if rounded < self.min_qty {
            self.min_qty
        } else {
            rounded
        }
    }

    /// Decimal precision as an integer, useful for formatting order payloads.
    #[must_use]
    pub fn price_precision(&self) -> u32 {
        Self::decimals_for(self.tick_size)
    }

    #[must_use]
    pub fn qty_precision(&self) -> u32 {
        Self::decimals_for(self.min_qty)
    }
}

/// `log10` helper shared by rounding and autocorrection; both need the order
/// of magnitude of a decimal value without pulling in a full `num` stack.
#[must_use]
pub fn order_of_magnitude(value: Decimal) -> i32 {
    let Some(f) = value.to_f64() else {
        return 0;
    };
    if f <= 0.0 {
        return 0;
    }
    f.log10().floor() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc_filter() -> SymbolFilter {
        SymbolFilter::new(dec!(0.1), dec!(0.001))
    }

    #[test]
    fn round_price_snaps_to_tick() {
        let f = btc_filter();
        assert_eq!(f.round_price(dec!(50123.47)), dec!(50123.5));
    }

    #[test]
    fn round_price_is_idempotent() {
        let f = btc_filter();
        let once = f.round_price(dec!(50123.47));
        let twice = f.round_price(once);
        assert_eq!(once, twice);
    }

    #[test]
    fn round_qty_snaps_to_lot_and_floors() {
        let f = btc_filter();
        assert_eq!(f.round_qty(dec!(1.23456)), dec!(1.234));
    }

    #[test]
    fn round_qty_is_idempotent() {
        let f = btc_filter();
        let once = f.round_qty(dec!(1.23456));
        let twice = f.round_qty(once);
        assert_eq!(once, twice);
    }

    #[test]
    fn round_qty_enforces_minimum() {
        let f = btc_filter();
        assert_eq!(f.round_qty(dec!(0.0001)), dec!(0.001));
    }

    #[test]
    fn order_of_magnitude_matches_expectation() {
        assert_eq!(order_of_magnitude(dec!(28390)), 4);
        assert_eq!(order_of_magnitude(dec!(0.02839)), -2);
        assert_eq!(order_of_magnitude(dec!(1)), 0);
    }
}
