//! Pure domain types: signals, orders, and the rounding rules that keep both
//! conformant with an exchange's tick/lot grid.

pub mod order;
pub mod rounding;
pub mod signal;

pub use order::{ChildRole, ClientOrderId, OrderRecord};
pub use rounding::SymbolFilter;
pub use signal::{Side, Signal};
