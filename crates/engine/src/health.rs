//! Periodic health reporting.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use market_feed::MarketFeed;
use metrics::{HealthStatus, SharedEngineMetrics};

/// Samples orchestrator state at a fixed interval and emits one structured
/// `health` record per sample.
pub struct HealthReporter {
    feed: Arc<MarketFeed>,
    metrics: SharedEngineMetrics,
    interval: Duration,
}

impl HealthReporter {
    pub fn new(feed: Arc<MarketFeed>, metrics: SharedEngineMetrics, interval: Duration) -> Self {
        Self {
            feed,
            metrics,
            interval,
        }
    }

    /// Report until stopped.
    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = interval.tick() => self.report(),
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// One sample. Degraded iff the feed is inactive while any runner is
    /// still non-terminal, or any runner failed since the previous report.
    fn report(&self) {
        let feed = self.feed.snapshot();
        let gauges = self.metrics.snapshot();
        let failed_recently = self.metrics.take_failed_since_report();

        let status = if (!feed.active && gauges.non_terminal() > 0) || failed_recently {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        info!(
            status = %status,
            active_strategies = gauges.open_positions,
            total_strategies = gauges.strategies_total,
            market_feed_active = feed.active,
            prices = ?feed.prices,
            dropped_ticks_total = self.feed.dropped_total(),
            "health"
        );
    }
}
