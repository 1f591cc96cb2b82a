//! Strategy definition and lifecycle state.

use std::fmt;

use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Strategy lifecycle phases.
///
/// Valid transitions: CREATED→OPEN→{CLOSED, FORCE_CLOSED}, CREATED→CLOSED
/// (shutdown before entry), and any non-terminal phase →FAILED. Terminal
/// phases are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Created,
    Open,
    Closed,
    ForceClosed,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Closed | Phase::ForceClosed | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Created => write!(f, "CREATED"),
            Phase::Open => write!(f, "OPEN"),
            Phase::Closed => write!(f, "CLOSED"),
            Phase::ForceClosed => write!(f, "FORCE_CLOSED"),
            Phase::Failed => write!(f, "FAILED"),
        }
    }
}

/// Why a position (or pre-entry strategy) was terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    ExitCondition,
    StopLoss,
    TargetHit,
    MarketClose,
    Error,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::ExitCondition => write!(f, "EXIT_CONDITION"),
            ExitReason::StopLoss => write!(f, "STOP_LOSS"),
            ExitReason::TargetHit => write!(f, "TARGET_HIT"),
            ExitReason::MarketClose => write!(f, "MARKET_CLOSE"),
            ExitReason::Error => write!(f, "ERROR"),
        }
    }
}

/// Immutable strategy input, loaded from the strategy file at startup.
///
/// Predicates are kept as source strings here; the orchestrator parses them
/// before any runner starts so malformed predicates fail the whole launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyDefinition {
    pub strategy_id: String,
    pub instrument: String,
    pub entry_condition: String,
    pub exit_condition: String,
    pub quantity: u32,
    pub max_loss: Decimal,
    pub max_profit: Decimal,
}

/// A strategy definition that fails basic field validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("strategy_id must not be empty")]
    EmptyStrategyId,

    #[error("[{strategy_id}] instrument must not be empty")]
    EmptyInstrument { strategy_id: String },

    #[error("[{strategy_id}] quantity must be positive")]
    ZeroQuantity { strategy_id: String },

    #[error("[{strategy_id}] {field} must be positive, got {value}")]
    NonPositiveLimit {
        strategy_id: String,
        field: &'static str,
        value: Decimal,
    },
}

impl StrategyDefinition {
    /// Check field-level constraints that the JSON schema cannot express.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.strategy_id.trim().is_empty() {
            return Err(ValidationError::EmptyStrategyId);
        }
        if self.instrument.trim().is_empty() {
            return Err(ValidationError::EmptyInstrument {
                strategy_id: self.strategy_id.clone(),
            });
        }
        if self.quantity == 0 {
            return Err(ValidationError::ZeroQuantity {
                strategy_id: self.strategy_id.clone(),
            });
        }
        if self.max_loss <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveLimit {
                strategy_id: self.strategy_id.clone(),
                field: "max_loss",
                value: self.max_loss,
            });
        }
        if self.max_profit <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveLimit {
                strategy_id: self.strategy_id.clone(),
                field: "max_profit",
                value: self.max_profit,
            });
        }
        Ok(())
    }
}

/// Mutable lifecycle state, owned exclusively by the strategy's runner.
///
/// The orchestrator only reads it after the runner has terminated.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyState {
    pub phase: Phase,
    pub entry_price: Option<Decimal>,
    pub entry_time: Option<DateTime<Local>>,
    pub exit_price: Option<Decimal>,
    pub exit_time: Option<DateTime<Local>>,
    pub exit_reason: Option<ExitReason>,
    pub last_price: Option<Decimal>,
    pub realized_pnl: Option<Decimal>,
}

impl StrategyState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Created,
            entry_price: None,
            entry_time: None,
            exit_price: None,
            exit_time: None,
            exit_reason: None,
            last_price: None,
            realized_pnl: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.phase == Phase::Open
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// P&L of an open position at `price`, or `None` on missing entry or
    /// decimal overflow.
    pub fn pnl_at(&self, price: Decimal, quantity: u32) -> Option<Decimal> {
        let entry = self.entry_price?;
        price
            .checked_sub(entry)?
            .checked_mul(Decimal::from(quantity))
    }

    /// CREATED→OPEN: record the fill and start tracking the position.
    pub fn enter(&mut self, price: Decimal, ts: DateTime<Local>) {
        self.phase = Phase::Open;
        self.entry_price = Some(price);
        self.entry_time = Some(ts);
        self.last_price = Some(price);
    }

    /// OPEN→CLOSED (or FORCE_CLOSED for a market-close exit): record the
    /// terminal fill. `realized_pnl` is computed by the caller with checked
    /// arithmetic so an overflow surfaces as a runner error, not a panic.
    pub fn exit(
        &mut self,
        price: Decimal,
        ts: DateTime<Local>,
        reason: ExitReason,
        realized_pnl: Decimal,
    ) {
        self.exit_price = Some(price);
        self.exit_time = Some(ts);
        self.exit_reason = Some(reason);
        self.realized_pnl = Some(realized_pnl);
        self.phase = if reason == ExitReason::MarketClose {
            Phase::ForceClosed
        } else {
            Phase::Closed
        };
    }

    /// CREATED→CLOSED at shutdown with no position ever opened.
    pub fn close_never_entered(&mut self) {
        self.phase = Phase::Closed;
    }

    /// Any non-terminal phase →FAILED.
    pub fn mark_failed(&mut self) {
        self.phase = Phase::Failed;
        self.exit_reason = Some(ExitReason::Error);
    }
}

impl Default for StrategyState {
    fn default() -> Self {
        Self::new()
    }
}

/// Final per-strategy result handed back to the orchestrator after the
/// runner terminates.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyRecord {
    pub strategy_id: String,
    pub instrument: String,
    pub state: StrategyState,
}
