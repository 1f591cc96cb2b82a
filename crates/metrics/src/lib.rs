//! Engine-wide gauges sampled by the health reporter.
//!
//! Strategy state itself is owned by each runner; these counters are the
//! only cross-task view of lifecycle progress. Runners update them on every
//! transition, the health reporter reads point-in-time snapshots.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Thread-safe lifecycle counters for the whole strategy population.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    strategies_total: AtomicUsize,
    open_positions: AtomicUsize,
    terminal_strategies: AtomicUsize,
    failed_strategies: AtomicUsize,
    never_entered: AtomicUsize,
    entries: AtomicU64,
    exits: AtomicU64,

    /// Set on every FAILED transition, cleared by the health reporter.
    failed_since_report: AtomicBool,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the launched population size. Called once at startup.
    pub fn set_strategies_total(&self, total: usize) {
        self.strategies_total.store(total, Ordering::Relaxed);
    }

    pub fn record_entry(&self) {
        self.entries.fetch_add(1, Ordering::Relaxed);
        self.open_positions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a terminal exit of an open position (CLOSED or FORCE_CLOSED).
    pub fn record_exit(&self) {
        self.exits.fetch_add(1, Ordering::Relaxed);
        self.open_positions.fetch_sub(1, Ordering::Relaxed);
        self.terminal_strategies.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a CLOSED transition of a strategy that never entered a
    /// position. Tracked apart from completed trades so the summary can
    /// report it on its own line.
    pub fn record_never_entered(&self) {
        self.never_entered.fetch_add(1, Ordering::Relaxed);
        self.terminal_strategies.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a FAILED transition. `was_open` releases the open-position
    /// gauge when the failure happened mid-position.
    pub fn record_failure(&self, was_open: bool) {
        if was_open {
            self.open_positions.fetch_sub(1, Ordering::Relaxed);
        }
        self.failed_strategies.fetch_add(1, Ordering::Relaxed);
        self.terminal_strategies.fetch_add(1, Ordering::Relaxed);
        self.failed_since_report.store(true, Ordering::Relaxed);
    }

    /// True if any strategy failed since the last call. Clears the flag.
    pub fn take_failed_since_report(&self) -> bool {
        self.failed_since_report.swap(false, Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            strategies_total: self.strategies_total.load(Ordering::Relaxed),
            open_positions: self.open_positions.load(Ordering::Relaxed),
            terminal_strategies: self.terminal_strategies.load(Ordering::Relaxed),
            failed_strategies: self.failed_strategies.load(Ordering::Relaxed),
            never_entered: self.never_entered.load(Ordering::Relaxed),
            entries: self.entries.load(Ordering::Relaxed),
            exits: self.exits.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of the engine gauges.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub strategies_total: usize,
    pub open_positions: usize,
    pub terminal_strategies: usize,
    pub failed_strategies: usize,
    pub never_entered: usize,
    pub entries: u64,
    pub exits: u64,
}

impl MetricsSnapshot {
    /// Strategies still running (pre-entry or holding a position).
    pub fn non_terminal(&self) -> usize {
        self.strategies_total
            .saturating_sub(self.terminal_strategies)
    }
}

/// Health status of the engine, derived per report interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
        }
    }
}

/// Shared handle to metrics.
pub type SharedEngineMetrics = Arc<EngineMetrics>;

pub fn create_metrics() -> SharedEngineMetrics {
    Arc::new(EngineMetrics::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_exit_gauges() {
        let metrics = EngineMetrics::new();
        metrics.set_strategies_total(3);

        metrics.record_entry();
        metrics.record_entry();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.open_positions, 2);
        assert_eq!(snapshot.entries, 2);
        assert_eq!(snapshot.non_terminal(), 3);

        metrics.record_exit();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.open_positions, 1);
        assert_eq!(snapshot.exits, 1);
        assert_eq!(snapshot.terminal_strategies, 1);
        assert_eq!(snapshot.non_terminal(), 2);
    }

    #[test]
    fn test_failure_releases_open_gauge() {
        let metrics = EngineMetrics::new();
        metrics.set_strategies_total(1);

        metrics.record_entry();
        metrics.record_failure(true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.open_positions, 0);
        assert_eq!(snapshot.failed_strategies, 1);
        assert_eq!(snapshot.non_terminal(), 0);
    }

    #[test]
    fn test_failed_flag_clears_on_take() {
        let metrics = EngineMetrics::new();
        assert!(!metrics.take_failed_since_report());

        metrics.record_failure(false);
        assert!(metrics.take_failed_since_report());
        assert!(!metrics.take_failed_since_report());
    }

    #[test]
    fn test_never_entered_counts_terminal() {
        let metrics = EngineMetrics::new();
        metrics.set_strategies_total(2);
        metrics.record_never_entered();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.open_positions, 0);
        assert_eq!(snapshot.never_entered, 1);
        assert_eq!(snapshot.non_terminal(), 1);
    }

    #[test]
    fn test_completed_exit_does_not_count_never_entered() {
        let metrics = EngineMetrics::new();
        metrics.set_strategies_total(1);
        metrics.record_entry();
        metrics.record_exit();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.never_entered, 0);
        assert_eq!(snapshot.terminal_strategies, 1);
    }
}
