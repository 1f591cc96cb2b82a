use std::fmt;

use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single price sample for an instrument at a specific instant.
///
/// Ticks are immutable once emitted. Ticks for a given instrument are
/// totally ordered by `ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub instrument: String,
    pub price: Decimal,
    pub ts: DateTime<Local>,
}

impl Tick {
    pub fn new(instrument: impl Into<String>, price: Decimal, ts: DateTime<Local>) -> Self {
        Self {
            instrument: instrument.into(),
            price,
            ts,
        }
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.instrument, self.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_display() {
        let tick = Tick::new("NIFTY", dec!(20100.50), Local::now());
        assert_eq!(tick.to_string(), "NIFTY @ 20100.50");
    }
}
