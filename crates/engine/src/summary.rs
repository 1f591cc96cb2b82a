//! Final execution summary.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;

use model::{Phase, StrategyRecord};

/// Everything the engine reports after shutdown: per-strategy outcomes,
/// aggregate counts, and overall P&L.
#[derive(Debug)]
pub struct EngineSummary {
    pub records: Vec<StrategyRecord>,
    /// Runners that missed the shutdown grace deadline.
    pub abandoned: Vec<String>,
    /// Set when the feed died and could not be restarted.
    pub degraded: bool,
}

impl EngineSummary {
    pub fn new(records: Vec<StrategyRecord>, abandoned: Vec<String>, degraded: bool) -> Self {
        Self {
            records,
            abandoned,
            degraded,
        }
    }

    /// Count of finished strategies per phase, plus `ABANDONED` stragglers.
    pub fn phase_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.state.phase.to_string()).or_insert(0) += 1;
        }
        if !self.abandoned.is_empty() {
            counts.insert("ABANDONED".to_string(), self.abandoned.len());
        }
        counts
    }

    /// Count of finished strategies per exit reason.
    pub fn reason_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            if let Some(reason) = record.state.exit_reason {
                *counts.entry(reason.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Sum of realized P&L across all closed positions.
    pub fn total_pnl(&self) -> Decimal {
        self.records
            .iter()
            .filter_map(|r| r.state.realized_pnl)
            .fold(Decimal::ZERO, |total, pnl| {
                total.checked_add(pnl).unwrap_or(total)
            })
    }

    /// Strategies that closed with a profit.
    pub fn winners(&self) -> usize {
        self.records
            .iter()
            .filter_map(|r| r.state.realized_pnl)
            .filter(|pnl| *pnl > Decimal::ZERO)
            .count()
    }

    /// Strategies that closed with a loss.
    pub fn losers(&self) -> usize {
        self.records
            .iter()
            .filter_map(|r| r.state.realized_pnl)
            .filter(|pnl| *pnl < Decimal::ZERO)
            .count()
    }

    /// Strategies retired at shutdown without ever opening a position.
    /// These land in the CLOSED phase but carry no fill and no P&L, so they
    /// are counted apart from completed trades.
    pub fn never_entered(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.state.phase == Phase::Closed && r.state.entry_price.is_none())
            .count()
    }
}

impl fmt::Display for EngineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Final Summary ===")?;
        for record in &self.records {
            let state = &record.state;
            let fmt_price = |p: Option<Decimal>| {
                p.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string())
            };
            writeln!(
                f,
                "{:<20} {:<13} entry={:<10} exit={:<10} reason={:<14} pnl={}",
                record.strategy_id,
                state.phase.to_string(),
                fmt_price(state.entry_price),
                fmt_price(state.exit_price),
                state
                    .exit_reason
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                fmt_price(state.realized_pnl),
            )?;
        }
        for strategy_id in &self.abandoned {
            writeln!(f, "{:<20} ABANDONED", strategy_id)?;
        }

        writeln!(f, "---")?;
        for (phase, count) in self.phase_counts() {
            writeln!(f, "{:<14} {}", phase, count)?;
        }
        for (reason, count) in self.reason_counts() {
            writeln!(f, "{:<14} {}", reason, count)?;
        }
        writeln!(f, "---")?;
        writeln!(f, "Total PnL:     {:+}", self.total_pnl())?;
        writeln!(f, "Winners:       {}", self.winners())?;
        writeln!(f, "Losers:        {}", self.losers())?;
        writeln!(f, "Never entered: {}", self.never_entered())?;
        if self.degraded {
            writeln!(f, "Status:        DEGRADED (feed failure)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use model::{ExitReason, StrategyState};
    use rust_decimal_macros::dec;

    fn record(id: &str, pnl: Option<Decimal>, reason: Option<ExitReason>) -> StrategyRecord {
        let mut state = StrategyState::new();
        if let Some(pnl) = pnl {
            let now = Local::now();
            state.enter(dec!(100), now);
            state.exit(dec!(100) + pnl, now, reason.unwrap_or(ExitReason::ExitCondition), pnl);
        } else {
            state.close_never_entered();
        }
        StrategyRecord {
            strategy_id: id.to_string(),
            instrument: "NIFTY".to_string(),
            state,
        }
    }

    #[test]
    fn test_totals_and_counts() {
        let summary = EngineSummary::new(
            vec![
                record("s1", Some(dec!(150)), Some(ExitReason::TargetHit)),
                record("s2", Some(dec!(-40)), Some(ExitReason::StopLoss)),
                record("s3", None, None),
            ],
            vec!["s4".to_string()],
            false,
        );

        assert_eq!(summary.total_pnl(), dec!(110));
        assert_eq!(summary.winners(), 1);
        assert_eq!(summary.losers(), 1);

        // s3 shares the CLOSED phase with the completed trades but is
        // reported as never-entered, not as a completed trade.
        assert_eq!(summary.never_entered(), 1);

        let phases = summary.phase_counts();
        assert_eq!(phases.get("CLOSED"), Some(&3));
        assert_eq!(phases.get("ABANDONED"), Some(&1));

        let reasons = summary.reason_counts();
        assert_eq!(reasons.get("TARGET_HIT"), Some(&1));
        assert_eq!(reasons.get("STOP_LOSS"), Some(&1));
    }

    #[test]
    fn test_display_renders_every_row() {
        let summary = EngineSummary::new(
            vec![record("alpha", Some(dec!(10)), Some(ExitReason::ExitCondition))],
            vec!["beta".to_string()],
            true,
        );
        let rendered = summary.to_string();
        assert!(rendered.contains("alpha"));
        assert!(rendered.contains("beta"));
        assert!(rendered.contains("ABANDONED"));
        assert!(rendered.contains("DEGRADED"));
        assert!(rendered.contains("Total PnL"));
        assert!(rendered.contains("Never entered: 0"));
    }

    #[test]
    fn test_never_entered_line_in_display() {
        let summary = EngineSummary::new(
            vec![
                record("traded", Some(dec!(25)), Some(ExitReason::TargetHit)),
                record("skipped", None, None),
            ],
            Vec::new(),
            false,
        );
        assert_eq!(summary.never_entered(), 1);
        assert!(summary.to_string().contains("Never entered: 1"));
    }
}
