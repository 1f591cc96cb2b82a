//! Core data model for the trading engine.
//!
//! This crate defines the types shared by the market feed, the strategy
//! runners, and the orchestrator:
//!
//! - **Tick**: a single price sample for an instrument
//! - **StrategyDefinition**: the immutable strategy input loaded at startup
//! - **StrategyState**: the runner-owned lifecycle record
//! - **Phase / ExitReason**: the lifecycle state machine vocabulary

mod strategy;
mod tick;

pub use strategy::{
    ExitReason, Phase, StrategyDefinition, StrategyRecord, StrategyState, ValidationError,
};
pub use tick::Tick;
