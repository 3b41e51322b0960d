//! Order placement and the rest of the order lifecycle.
//!
//! Placing an order decrements stock and records the order in one
//! transaction. The stock decrement is a single conditional `UPDATE`, so two
//! concurrent orders can never both spend the same units.

mod orders;

pub use orders::*;
