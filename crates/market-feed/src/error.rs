//! Market feed error types.

use thiserror::Error;

/// Errors surfaced by the market feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Subscription requested for an instrument with no seed price.
    #[error("no seed price for instrument '{0}'")]
    UnknownInstrument(String),
}
