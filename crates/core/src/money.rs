//! Monetary rounding shared by the pricing and ledger engines.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places monetary amounts are rounded to.
pub const MONEY_SCALE: u32 = 2;

/// Round a monetary amount to [`MONEY_SCALE`] places, half-up.
///
/// Half-up here means midpoint away from zero, so `0.125 -> 0.13` and
/// `-0.125 -> -0.13`.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Smallest representable monetary step (`0.01`).
pub fn money_epsilon() -> Decimal {
    Decimal::new(1, MONEY_SCALE)
}

/// Whether two amounts agree within one rounding step.
pub fn within_rounding(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= money_epsilon()
}
