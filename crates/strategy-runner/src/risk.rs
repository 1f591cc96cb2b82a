//! Per-tick risk check for an open position.

use rust_decimal::Decimal;

use crate::error::RunnerError;

/// Verdict of a risk check against a new price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskVerdict {
    /// Neither bound breached; keep holding.
    Hold,
    /// Loss bound breached.
    StopLoss,
    /// Profit bound reached.
    TargetHit,
}

/// Absolute P&L bounds for one strategy's position.
#[derive(Debug, Clone)]
pub struct RiskMonitor {
    max_loss: Decimal,
    max_profit: Decimal,
}

impl RiskMonitor {
    pub fn new(max_loss: Decimal, max_profit: Decimal) -> Self {
        Self {
            max_loss,
            max_profit,
        }
    }

    /// Check an open position against a new price.
    ///
    /// Stop-loss is evaluated first: if both thresholds straddle the new
    /// price, the position exits as a loss, never as a win.
    pub fn check(
        &self,
        entry_price: Decimal,
        quantity: u32,
        tick_price: Decimal,
    ) -> Result<RiskVerdict, RunnerError> {
        let pnl = tick_price
            .checked_sub(entry_price)
            .and_then(|delta| delta.checked_mul(Decimal::from(quantity)))
            .ok_or(RunnerError::PnlOverflow {
                entry_price,
                quantity,
                price: tick_price,
            })?;

        if pnl <= -self.max_loss {
            Ok(RiskVerdict::StopLoss)
        } else if pnl >= self.max_profit {
            Ok(RiskVerdict::TargetHit)
        } else {
            Ok(RiskVerdict::Hold)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn monitor() -> RiskMonitor {
        RiskMonitor::new(dec!(200), dec!(1000))
    }

    #[test]
    fn test_hold_inside_bounds() {
        let verdict = monitor().check(dec!(101), 10, dec!(101)).unwrap();
        assert_eq!(verdict, RiskVerdict::Hold);

        let verdict = monitor().check(dec!(101), 10, dec!(90)).unwrap();
        assert_eq!(verdict, RiskVerdict::Hold); // pnl = -110, above -200
    }

    #[test]
    fn test_stop_loss_at_and_past_bound() {
        // pnl = (81 - 101) * 10 = -200: exactly at the bound fires.
        let verdict = monitor().check(dec!(101), 10, dec!(81)).unwrap();
        assert_eq!(verdict, RiskVerdict::StopLoss);

        let verdict = monitor().check(dec!(101), 10, dec!(80)).unwrap();
        assert_eq!(verdict, RiskVerdict::StopLoss); // pnl = -210
    }

    #[test]
    fn test_target_hit() {
        let verdict = monitor().check(dec!(101), 10, dec!(201)).unwrap();
        assert_eq!(verdict, RiskVerdict::TargetHit); // pnl = +1000
    }

    #[test]
    fn test_stop_loss_wins_when_bounds_are_trivial() {
        // max_loss 0 and max_profit 0: any pnl satisfies both, stop-loss
        // takes precedence.
        let monitor = RiskMonitor::new(dec!(0), dec!(0));
        let verdict = monitor.check(dec!(100), 1, dec!(100)).unwrap();
        assert_eq!(verdict, RiskVerdict::StopLoss);
    }

    #[test]
    fn test_overflow_is_an_error() {
        let monitor = RiskMonitor::new(dec!(200), dec!(1000));
        let result = monitor.check(Decimal::MAX, 10, Decimal::MIN);
        assert!(matches!(result, Err(RunnerError::PnlOverflow { .. })));
    }
}
