//! Strategy lifecycle task.

use chrono::{DateTime, Local};
use tokio::sync::watch;
use tracing::{debug, error, info};

use common::{minutes_of, SharedClock};
use market_feed::TickReceiver;
use metrics::SharedEngineMetrics;
use model::{ExitReason, Phase, StrategyDefinition, StrategyRecord, StrategyState, Tick};
use predicate::{Env, Predicate};

use crate::error::RunnerError;
use crate::risk::{RiskMonitor, RiskVerdict};

/// One strategy's execution task.
///
/// The runner is the sole writer of its `StrategyState`. It consumes the
/// strategy's tick subscription, drives the CREATED→OPEN→terminal state
/// machine, and hands back a `StrategyRecord` when it terminates.
pub struct StrategyRunner {
    definition: StrategyDefinition,
    entry_condition: Predicate,
    exit_condition: Predicate,
    risk: RiskMonitor,
    state: StrategyState,
    metrics: SharedEngineMetrics,
    clock: SharedClock,
}

impl StrategyRunner {
    /// Create a runner from a validated definition and its pre-parsed
    /// predicates.
    pub fn new(
        definition: StrategyDefinition,
        entry_condition: Predicate,
        exit_condition: Predicate,
        metrics: SharedEngineMetrics,
        clock: SharedClock,
    ) -> Self {
        let risk = RiskMonitor::new(definition.max_loss, definition.max_profit);
        Self {
            definition,
            entry_condition,
            exit_condition,
            risk,
            state: StrategyState::new(),
            metrics,
            clock,
        }
    }

    pub fn strategy_id(&self) -> &str {
        &self.definition.strategy_id
    }

    /// Run until the strategy reaches a terminal phase or shutdown fires.
    ///
    /// A tick in flight is always evaluated to completion before the cancel
    /// branch runs, so a position is never half-updated. Errors are absorbed
    /// here: the strategy transitions to FAILED and the task returns
    /// normally.
    pub async fn run(
        mut self,
        mut ticks: TickReceiver,
        mut shutdown: watch::Receiver<bool>,
    ) -> StrategyRecord {
        info!(
            strategy_id = %self.definition.strategy_id,
            instrument = %self.definition.instrument,
            entry = %self.entry_condition,
            exit = %self.exit_condition,
            "strategy_started"
        );

        loop {
            if self.state.is_terminal() {
                break;
            }
            // Catches a trigger that fired before this iteration subscribed.
            if *shutdown.borrow() {
                self.force_close();
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    // A dropped sender counts as a shutdown order.
                    if changed.is_err() || *shutdown.borrow() {
                        self.force_close();
                        break;
                    }
                }

                maybe_tick = ticks.recv() => match maybe_tick {
                    Some(tick) => {
                        if let Err(e) = self.on_tick(&tick) {
                            self.fail(&e);
                        }
                    }
                    // Feed ended; same path as market close.
                    None => {
                        self.force_close();
                        break;
                    }
                }
            }
        }

        StrategyRecord {
            strategy_id: self.definition.strategy_id,
            instrument: self.definition.instrument,
            state: self.state,
        }
    }

    fn on_tick(&mut self, tick: &Tick) -> Result<(), RunnerError> {
        let env = Env {
            price: tick.price,
            time_minutes: minutes_of(tick.ts),
        };

        match self.state.phase {
            Phase::Created => {
                if self.entry_condition.eval(&env) {
                    self.state.enter(tick.price, tick.ts);
                    self.metrics.record_entry();
                    info!(
                        strategy_id = %self.definition.strategy_id,
                        price = %tick.price,
                        quantity = self.definition.quantity,
                        "entry"
                    );
                }
            }
            Phase::Open => {
                self.state.last_price = Some(tick.price);

                // entry_price is always set while OPEN
                let entry_price = self.state.entry_price.ok_or(RunnerError::MissingEntry)?;

                // Risk outranks the exit predicate: a stop-loss can never be
                // missed because the exit condition fired on the same tick.
                let verdict = self
                    .risk
                    .check(entry_price, self.definition.quantity, tick.price)?;
                match verdict {
                    RiskVerdict::StopLoss => {
                        self.exit_position(tick.price, tick.ts, ExitReason::StopLoss)?;
                    }
                    RiskVerdict::TargetHit => {
                        self.exit_position(tick.price, tick.ts, ExitReason::TargetHit)?;
                    }
                    RiskVerdict::Hold => {
                        if self.exit_condition.eval(&env) {
                            self.exit_position(tick.price, tick.ts, ExitReason::ExitCondition)?;
                        }
                    }
                }
            }
            // Terminal phases ignore stray ticks.
            Phase::Closed | Phase::ForceClosed | Phase::Failed => {}
        }

        Ok(())
    }

    fn exit_position(
        &mut self,
        price: rust_decimal::Decimal,
        ts: DateTime<Local>,
        reason: ExitReason,
    ) -> Result<(), RunnerError> {
        let entry_price = self.state.entry_price.ok_or(RunnerError::MissingEntry)?;
        let pnl = self
            .state
            .pnl_at(price, self.definition.quantity)
            .ok_or(RunnerError::PnlOverflow {
                entry_price,
                quantity: self.definition.quantity,
                price,
            })?;

        self.state.exit(price, ts, reason, pnl);
        self.metrics.record_exit();
        info!(
            strategy_id = %self.definition.strategy_id,
            price = %price,
            reason = %reason,
            pnl = %pnl,
            "exit"
        );
        Ok(())
    }

    /// The shutdown path: close an open position at the last observed
    /// price, or retire a strategy that never entered.
    fn force_close(&mut self) {
        match self.state.phase {
            Phase::Open => {
                let price = self.state.last_price.or(self.state.entry_price);
                let now = self.clock.now();
                match price {
                    Some(price) => {
                        if let Err(e) = self.exit_position(price, now, ExitReason::MarketClose) {
                            self.fail(&e);
                        }
                    }
                    None => self.fail(&RunnerError::MissingEntry),
                }
            }
            Phase::Created => {
                self.state.close_never_entered();
                self.metrics.record_never_entered();
                debug!(
                    strategy_id = %self.definition.strategy_id,
                    "no position at shutdown"
                );
            }
            Phase::Closed | Phase::ForceClosed | Phase::Failed => {}
        }
    }

    fn fail(&mut self, err: &RunnerError) {
        let was_open = self.state.is_open();
        self.state.mark_failed();
        self.metrics.record_failure(was_open);
        error!(
            strategy_id = %self.definition.strategy_id,
            error = %err,
            "error"
        );
    }
}
