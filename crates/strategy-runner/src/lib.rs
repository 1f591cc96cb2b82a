//! Per-strategy execution runtime.
//!
//! This crate provides the pieces that drive one strategy's lifecycle:
//!
//! - **RiskMonitor**: pure per-tick stop-loss / target check
//! - **StrategyRunner**: the task owning a strategy's state machine
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐ ticks  ┌──────────────────────────────┐
//! │ MarketFeed │───────>│ StrategyRunner               │
//! └────────────┘        │  CREATED ──entry──> OPEN     │
//!                       │  OPEN ──risk/exit─> CLOSED   │
//!        shutdown ─────>│  OPEN ──shutdown──> FORCE_   │
//!        (watch)        │                     CLOSED   │
//!                       └──────────────────────────────┘
//! ```
//!
//! Each runner is the sole writer of its `StrategyState`. A failure inside
//! one runner transitions that strategy to FAILED and never propagates to
//! the feed, the orchestrator, or sibling runners.

mod error;
mod risk;
mod runner;

pub use error::RunnerError;
pub use risk::{RiskMonitor, RiskVerdict};
pub use runner::StrategyRunner;
