//! Money helpers
//!
//! All order financials are [`Decimal`] at 2 decimal places; rounding
//! happens once at each boundary, never midway through a sum.

use rust_decimal::Decimal;

/// Round to 2 decimal places (banker's rounding, rust_decimal default)
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp(2)
}

/// Line total for a quantity at a unit price snapshot
pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    round_money(unit_price * Decimal::from(quantity))
}
