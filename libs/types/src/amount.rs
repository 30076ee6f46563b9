//! Ledger amounts
//!
//! Amounts are carried as signed 64-bit integers of the smallest unit
//! (seven decimal places per whole unit) everywhere they are stored or
//! signed. `Decimal` is only used to render them for humans.

use rust_decimal::Decimal;

/// Decimal places between the integer amount and one whole unit
pub const AMOUNT_SCALE: u32 = 7;

/// Smallest units in one whole unit
pub const ONE: i64 = 10_000_000;

/// Render an integer amount in whole units, e.g. `50` -> `"0.0000050"`.
pub fn to_decimal(amount: i64) -> Decimal {
    Decimal::new(amount, AMOUNT_SCALE)
}

pub fn format_amount(amount: i64) -> String {
    to_decimal(amount).to_string()
}
