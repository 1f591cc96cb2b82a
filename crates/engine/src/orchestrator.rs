//! Engine construction and the run/shutdown sequence.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use common::{next_occurrence, EngineConfig, SharedClock};
use market_feed::{FeedConfig, MarketFeed, TickReceiver};
use metrics::{create_metrics, SharedEngineMetrics};
use model::StrategyDefinition;
use predicate::Predicate;
use strategy_runner::StrategyRunner;

use crate::error::EngineError;
use crate::health::HealthReporter;
use crate::summary::EngineSummary;

/// Starting price for instruments whose entry condition carries no price
/// literal to derive one from.
const DEFAULT_SEED_PRICE: Decimal = dec!(100);

/// The orchestrator: owns the feed, the runner population, and shutdown.
pub struct Engine {
    config: EngineConfig,
    clock: SharedClock,
    feed: Arc<MarketFeed>,
    metrics: SharedEngineMetrics,
    runners: Vec<(StrategyRunner, TickReceiver)>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("runners", &self.runners.len())
            .finish()
    }
}

impl Engine {
    /// Build a ready-to-run engine: parse every predicate (the first bad
    /// one fails the whole launch), seed the simulator, subscribe every
    /// strategy, and construct the runners.
    pub fn new(
        config: EngineConfig,
        clock: SharedClock,
        definitions: Vec<StrategyDefinition>,
    ) -> Result<Self, EngineError> {
        let metrics = create_metrics();
        metrics.set_strategies_total(definitions.len());

        let mut parsed = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let entry = parse_condition(&definition, "entry", &definition.entry_condition)?;
            let exit = parse_condition(&definition, "exit", &definition.exit_condition)?;
            if entry.uses_price_equality() || exit.uses_price_equality() {
                warn!(
                    strategy_id = %definition.strategy_id,
                    "predicate uses '==' on price; exact decimal equality rarely fires"
                );
            }
            parsed.push((definition, entry, exit));
        }

        // Seed each instrument from the first entry condition that quotes a
        // price for it.
        let mut seed_prices: HashMap<String, Decimal> = HashMap::new();
        for (definition, entry, _) in &parsed {
            seed_prices
                .entry(definition.instrument.clone())
                .or_insert_with(|| entry.first_price_literal().unwrap_or(DEFAULT_SEED_PRICE));
        }

        let feed = Arc::new(MarketFeed::new(
            FeedConfig {
                tick_interval: config.tick_interval,
                volatility: config.volatility,
                subscription_capacity: config.subscription_capacity,
                seed_prices,
            },
            Arc::clone(&clock),
        ));

        let mut runners = Vec::with_capacity(parsed.len());
        for (definition, entry, exit) in parsed {
            let ticks = feed.subscribe(&definition.instrument)?;
            let runner = StrategyRunner::new(
                definition,
                entry,
                exit,
                Arc::clone(&metrics),
                Arc::clone(&clock),
            );
            runners.push((runner, ticks));
        }

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            clock,
            feed,
            metrics,
            runners,
            shutdown_tx: Arc::new(shutdown_tx),
        })
    }

    /// Handle that triggers shutdown when sent `true`. Cheap to clone,
    /// idempotent to fire.
    pub fn shutdown_trigger(&self) -> Arc<watch::Sender<bool>> {
        Arc::clone(&self.shutdown_tx)
    }

    /// Run until a shutdown trigger fires, then tear down in order:
    /// broadcast cancellation, join runners within the grace deadline
    /// (stragglers are abandoned), stop the feed, stop the health reporter,
    /// emit the summary.
    pub async fn run(self) -> EngineSummary {
        wait_for_market_open(&self.config, &self.clock).await;

        let Engine {
            config,
            clock,
            feed,
            metrics,
            runners,
            shutdown_tx,
        } = self;

        let degraded = Arc::new(AtomicBool::new(false));

        let feed_task =
            spawn_supervised_feed(Arc::clone(&feed), Arc::clone(&shutdown_tx), Arc::clone(&degraded));

        let mut runner_handles = Vec::with_capacity(runners.len());
        for (runner, ticks) in runners {
            let strategy_id = runner.strategy_id().to_string();
            let handle = tokio::spawn(runner.run(ticks, shutdown_tx.subscribe()));
            runner_handles.push((strategy_id, handle));
        }

        let (health_stop_tx, health_stop_rx) = watch::channel(false);
        let health_task = tokio::spawn(
            HealthReporter::new(
                Arc::clone(&feed),
                Arc::clone(&metrics),
                config.health_interval,
            )
            .run(health_stop_rx),
        );

        spawn_signal_listener(Arc::clone(&shutdown_tx));
        if let Some(close) = config.market_close {
            spawn_market_close_trigger(close, Arc::clone(&clock), Arc::clone(&shutdown_tx));
        }

        info!(
            strategies = runner_handles.len(),
            "engine running"
        );

        // Wait for any trigger: signal, market close, or feed failure.
        let mut shutdown_rx = shutdown_tx.subscribe();
        while !*shutdown_rx.borrow() {
            if shutdown_rx.changed().await.is_err() {
                break;
            }
        }
        info!("shutdown_begin");

        // Runners share one grace deadline; whoever misses it is abandoned.
        let deadline = tokio::time::Instant::now() + config.shutdown_grace;
        let mut records = Vec::new();
        let mut abandoned = Vec::new();
        for (strategy_id, mut handle) in runner_handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(record)) => records.push(record),
                Ok(Err(join_error)) => {
                    error!(strategy_id = %strategy_id, error = %join_error, "runner task died");
                    abandoned.push(strategy_id);
                }
                Err(_) => {
                    warn!(
                        strategy_id = %strategy_id,
                        "runner missed the shutdown deadline, abandoning"
                    );
                    handle.abort();
                    abandoned.push(strategy_id);
                }
            }
        }

        feed.stop();
        let _ = feed_task.await;

        let _ = health_stop_tx.send(true);
        let _ = health_task.await;

        info!("shutdown_end");

        let summary = EngineSummary::new(records, abandoned, degraded.load(Ordering::SeqCst));
        info!(
            total = summary.records.len() + summary.abandoned.len(),
            abandoned = summary.abandoned.len(),
            total_pnl = %summary.total_pnl(),
            winners = summary.winners(),
            losers = summary.losers(),
            never_entered = summary.never_entered(),
            "engine stopped"
        );
        summary
    }
}

fn parse_condition(
    definition: &StrategyDefinition,
    which: &'static str,
    text: &str,
) -> Result<Predicate, EngineError> {
    predicate::parse(text).map_err(|source| {
        error!(
            strategy_id = %definition.strategy_id,
            "invalid {} condition: {}",
            which,
            source.display_with_context(text)
        );
        EngineError::Predicate {
            strategy_id: definition.strategy_id.clone(),
            which,
            source,
        }
    })
}

/// Sleep until the configured market open, unless the session is already in
/// progress. With both open and close configured, "in progress" means the
/// coming close precedes the coming open, which also covers sessions that
/// straddle local midnight.
async fn wait_for_market_open(config: &EngineConfig, clock: &SharedClock) {
    let Some(open) = config.market_open else {
        return;
    };
    let now = clock.now();
    let next_open = next_occurrence(now, open);
    let pre_open = match config.market_close {
        Some(close) => next_open < next_occurrence(now, close),
        None => now.time() < open,
    };
    if !pre_open {
        return;
    }

    let delay = (next_open - now).to_std().unwrap_or_default();
    info!(open = %open, delay_secs = delay.as_secs(), "waiting for market open");
    tokio::time::sleep(delay).await;
}

/// Run the feed, restarting it once if its task dies. A second death flips
/// the degraded flag and triggers engine shutdown.
fn spawn_supervised_feed(
    feed: Arc<MarketFeed>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    degraded: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut restarted = false;
        loop {
            let run = {
                let feed = Arc::clone(&feed);
                let shutdown_rx = shutdown_tx.subscribe();
                tokio::spawn(async move { feed.run(shutdown_rx).await })
            };
            match run.await {
                Ok(()) => break,
                Err(join_error) => {
                    if !restarted {
                        restarted = true;
                        error!(error = %join_error, "market feed died, restarting");
                        continue;
                    }
                    error!(error = %join_error, "market feed died again, shutting down");
                    degraded.store(true, Ordering::SeqCst);
                    let _ = shutdown_tx.send(true);
                    break;
                }
            }
        }
    })
}

/// First SIGINT/SIGTERM triggers graceful shutdown; a second one inside the
/// grace window forces an immediate exit.
fn spawn_signal_listener(shutdown_tx: Arc<watch::Sender<bool>>) {
    tokio::spawn(async move {
        if wait_for_signal().await.is_err() {
            return;
        }
        info!("received shutdown signal");
        let _ = shutdown_tx.send(true);

        if wait_for_signal().await.is_ok() {
            warn!("second signal received, forcing exit");
            std::process::exit(130);
        }
    });
}

async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

/// Fire shutdown at the next wall-clock occurrence of the close time. The
/// comparison is on full instants, not times of day, so a session that
/// straddles midnight closes on the correct day.
fn spawn_market_close_trigger(
    close: NaiveTime,
    clock: SharedClock,
    shutdown_tx: Arc<watch::Sender<bool>>,
) {
    tokio::spawn(async move {
        let now = clock.now();
        let at = next_occurrence(now, close);
        let delay = (at - now).to_std().unwrap_or_default();
        info!(market_close = %at, "market close trigger armed");

        tokio::time::sleep(delay).await;
        info!(market_close = %at, "market close reached");
        let _ = shutdown_tx.send(true);
    });
}
