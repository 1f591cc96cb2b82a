//! Engine error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort engine startup or orchestration.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Environment configuration rejected.
    #[error(transparent)]
    Config(#[from] common::ConfigError),

    /// Strategy file unreadable.
    #[error("cannot read strategy file {path}: {source}")]
    StrategyFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Strategy file failed to deserialize (bad JSON, unknown or missing
    /// fields).
    #[error("invalid strategy file {path}: {source}")]
    StrategyFileFormat {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A strategy definition failed field validation.
    #[error(transparent)]
    Validation(#[from] model::ValidationError),

    /// Two strategies share a strategy_id.
    #[error("duplicate strategy_id '{0}'")]
    DuplicateStrategyId(String),

    /// A predicate failed to parse. The whole launch fails rather than
    /// silently dropping the strategy.
    #[error("[{strategy_id}] invalid {which} condition: {source}")]
    Predicate {
        strategy_id: String,
        which: &'static str,
        source: predicate::ParseError,
    },

    /// Feed rejected a subscription.
    #[error(transparent)]
    Feed(#[from] market_feed::FeedError),
}
