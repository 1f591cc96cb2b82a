//! Tick generation and fan-out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rand::Rng;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use common::SharedClock;
use model::Tick;

use crate::error::FeedError;
use crate::subscription::{subscription, SendStatus, TickReceiver, TickSender};

/// Market feed configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Seconds between tick rounds.
    pub tick_interval: Duration,
    /// Uniform half-width of the per-tick return.
    pub volatility: f64,
    /// Capacity of each subscriber queue.
    pub subscription_capacity: usize,
    /// Starting price per instrument. Instruments outside this table cannot
    /// be subscribed.
    pub seed_prices: HashMap<String, Decimal>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            volatility: 0.002,
            subscription_capacity: 64,
            seed_prices: HashMap::new(),
        }
    }
}

/// Non-blocking view of the feed for the health reporter.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub prices: HashMap<String, Decimal>,
    pub active: bool,
}

/// Simulated market data feed.
///
/// `run` drives a random walk per instrument: every `tick_interval` each
/// instrument's price moves by a uniform return in
/// `[-volatility, +volatility]`, rounded to 2 decimal places, and the tick
/// is fanned out to every subscriber of that instrument.
pub struct MarketFeed {
    config: FeedConfig,
    clock: SharedClock,
    subscribers: Mutex<HashMap<String, Vec<TickSender>>>,
    prices: RwLock<HashMap<String, Decimal>>,
    active: AtomicBool,
    dropped_total: AtomicU64,
    stop_tx: watch::Sender<bool>,
}

impl MarketFeed {
    pub fn new(config: FeedConfig, clock: SharedClock) -> Self {
        let prices = RwLock::new(config.seed_prices.clone());
        let (stop_tx, _) = watch::channel(false);
        Self {
            config,
            clock,
            subscribers: Mutex::new(HashMap::new()),
            prices,
            active: AtomicBool::new(false),
            dropped_total: AtomicU64::new(0),
            stop_tx,
        }
    }

    /// Register a subscriber for an instrument. Safe to call concurrently
    /// with a running feed; the orchestrator subscribes everything before
    /// spawning `run`.
    pub fn subscribe(&self, instrument: &str) -> Result<TickReceiver, FeedError> {
        if !self.prices.read().contains_key(instrument) {
            return Err(FeedError::UnknownInstrument(instrument.to_string()));
        }
        let (tx, rx) = subscription(self.config.subscription_capacity);
        self.subscribers
            .lock()
            .entry(instrument.to_string())
            .or_default()
            .push(tx);
        debug!(instrument, "new subscription");
        Ok(rx)
    }

    /// Emit ticks until shutdown or `stop()`. Completes the iteration in
    /// progress, then closes every subscription so already-queued ticks
    /// stay consumable.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut stop = self.stop_tx.subscribe();
        self.active.store(true, Ordering::SeqCst);
        info!(
            instruments = self.prices.read().len(),
            interval = ?self.config.tick_interval,
            volatility = self.config.volatility,
            "market feed started"
        );

        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            // Catches a stop that fired before this loop subscribed.
            if *shutdown.borrow() || *stop.borrow() {
                break;
            }

            tokio::select! {
                _ = interval.tick() => self.emit_round(),
                changed = shutdown.changed() => {
                    // A dropped sender counts as a shutdown order.
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = stop.changed() => {
                    if *stop.borrow() {
                        break;
                    }
                }
            }
        }

        self.close_subscriptions();
        self.active.store(false, Ordering::SeqCst);
        info!(
            dropped_total = self.dropped_total(),
            "market feed stopped"
        );
    }

    /// Stop emission out-of-band. Idempotent; does not discard queued ticks.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Non-blocking snapshot of current prices and liveness.
    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            prices: self.prices.read().clone(),
            active: self.active.load(Ordering::SeqCst),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Ticks discarded across all subscriptions since startup.
    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    /// One tick round: advance every instrument with a live subscriber and
    /// fan the tick out, pruning subscribers whose receiver is gone.
    fn emit_round(&self) {
        let now = self.clock.now();
        let mut subscribers = self.subscribers.lock();

        for (instrument, senders) in subscribers.iter_mut() {
            if senders.is_empty() {
                continue;
            }

            let price = self.advance_price(instrument);
            let tick = Tick::new(instrument.clone(), price, now);

            senders.retain(|sender| match sender.send(tick.clone()) {
                SendStatus::Delivered => true,
                SendStatus::DroppedOldest => {
                    self.dropped_total.fetch_add(1, Ordering::Relaxed);
                    warn!(instrument = %tick.instrument, "subscriber queue full, dropped oldest tick");
                    true
                }
                SendStatus::Disconnected => {
                    debug!(instrument = %tick.instrument, "pruning closed subscription");
                    false
                }
            });
        }
    }

    /// Random-walk step: `p × (1 + ε)`, ε uniform in [−vol, +vol], rounded
    /// to 2 decimal places.
    fn advance_price(&self, instrument: &str) -> Decimal {
        let mut prices = self.prices.write();
        let current = prices
            .get(instrument)
            .copied()
            .unwrap_or(Decimal::ONE_HUNDRED);

        let vol = self.config.volatility;
        let epsilon = if vol > 0.0 {
            rand::thread_rng().gen_range(-vol..=vol)
        } else {
            0.0
        };

        let factor = Decimal::ONE + Decimal::from_f64_retain(epsilon).unwrap_or_default();
        let next = current
            .checked_mul(factor)
            .unwrap_or(current)
            .round_dp(2);

        prices.insert(instrument.to_string(), next);
        next
    }

    fn close_subscriptions(&self) {
        for senders in self.subscribers.lock().values() {
            for sender in senders {
                sender.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::ManualClock;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn fixed_clock() -> Arc<ManualClock> {
        let start = chrono::Local
            .with_ymd_and_hms(2024, 1, 10, 10, 0, 0)
            .earliest()
            .unwrap();
        Arc::new(ManualClock::new(start))
    }

    fn feed_with(seeds: &[(&str, Decimal)], volatility: f64) -> MarketFeed {
        let config = FeedConfig {
            tick_interval: Duration::from_millis(10),
            volatility,
            subscription_capacity: 16,
            seed_prices: seeds
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        };
        MarketFeed::new(config, fixed_clock())
    }

    #[test]
    fn test_subscribe_unknown_instrument_rejected() {
        let feed = feed_with(&[("NIFTY", dec!(20100))], 0.002);
        assert!(matches!(
            feed.subscribe("TYPO"),
            Err(FeedError::UnknownInstrument(_))
        ));
    }

    #[test]
    fn test_snapshot_has_seed_prices() {
        let feed = feed_with(&[("NIFTY", dec!(20100)), ("BANKNIFTY", dec!(45000))], 0.002);
        let snapshot = feed.snapshot();
        assert_eq!(snapshot.prices.get("NIFTY"), Some(&dec!(20100)));
        assert_eq!(snapshot.prices.get("BANKNIFTY"), Some(&dec!(45000)));
        assert!(!snapshot.active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_emits_ticks_and_stops() {
        let feed = Arc::new(feed_with(&[("NIFTY", dec!(20100))], 0.0));
        let mut rx = feed.subscribe("NIFTY").unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let feed_task = {
            let feed = Arc::clone(&feed);
            tokio::spawn(async move { feed.run(shutdown_rx).await })
        };

        // Zero volatility: every tick carries the seed price.
        for _ in 0..3 {
            let tick = rx.recv().await.expect("tick while feed is running");
            assert_eq!(tick.price, dec!(20100));
            assert_eq!(tick.instrument, "NIFTY");
        }
        assert!(feed.is_active());

        shutdown_tx.send(true).unwrap();
        feed_task.await.unwrap();
        assert!(!feed.is_active());

        // Queue drains, then the stream ends.
        while rx.recv().await.is_some() {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let feed = Arc::new(feed_with(&[("NIFTY", dec!(100))], 0.0));
        let _rx = feed.subscribe("NIFTY").unwrap();

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let feed_task = {
            let feed = Arc::clone(&feed);
            tokio::spawn(async move { feed.run(shutdown_rx).await })
        };

        feed.stop();
        feed.stop();
        feed_task.await.unwrap();
        assert!(!feed.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_subscriber_does_not_stall_sibling() {
        let config = FeedConfig {
            tick_interval: Duration::from_millis(10),
            volatility: 0.0,
            subscription_capacity: 4,
            seed_prices: [("NIFTY".to_string(), dec!(100))].into_iter().collect(),
        };
        let feed = Arc::new(MarketFeed::new(config, fixed_clock()));

        // One subscriber never dequeues, the other drains normally.
        let stuck_rx = feed.subscribe("NIFTY").unwrap();
        let mut live_rx = feed.subscribe("NIFTY").unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let feed_task = {
            let feed = Arc::clone(&feed);
            tokio::spawn(async move { feed.run(shutdown_rx).await })
        };

        for _ in 0..20 {
            assert!(live_rx.recv().await.is_some());
        }

        // The stuck queue overflowed and was trimmed, never blocking the feed.
        assert!(stuck_rx.dropped() >= 6);
        assert!(feed.dropped_total() >= 6);

        shutdown_tx.send(true).unwrap();
        feed_task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_prices_evolve_with_volatility() {
        let feed = Arc::new(feed_with(&[("NIFTY", dec!(20100))], 0.01));
        let mut rx = feed.subscribe("NIFTY").unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let feed_task = {
            let feed = Arc::clone(&feed);
            tokio::spawn(async move { feed.run(shutdown_rx).await })
        };

        let mut prices = Vec::new();
        for _ in 0..10 {
            prices.push(rx.recv().await.unwrap().price);
        }
        shutdown_tx.send(true).unwrap();
        feed_task.await.unwrap();

        // Every price stays within the per-tick bound of its predecessor.
        let mut previous = dec!(20100);
        for price in prices {
            assert!(price > Decimal::ZERO);
            let bound = previous * dec!(0.011);
            assert!((price - previous).abs() <= bound, "{} -> {}", previous, price);
            previous = price;
        }
    }
}
