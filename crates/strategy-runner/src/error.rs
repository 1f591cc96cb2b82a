//! Strategy runner error types.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur while a runner processes ticks.
///
/// Any of these transitions the strategy to FAILED at the runner boundary;
/// they never propagate past it.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// P&L computation overflowed the decimal range.
    #[error("pnl overflow: entry {entry_price}, quantity {quantity}, price {price}")]
    PnlOverflow {
        entry_price: Decimal,
        quantity: u32,
        price: Decimal,
    },

    /// The position record lost its entry fill.
    #[error("open position has no entry price")]
    MissingEntry,
}
