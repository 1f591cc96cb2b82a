//! Simulated market data feed.
//!
//! One task generates price ticks for every instrument with at least one
//! subscriber and fans them out to per-subscriber bounded queues. A slow or
//! stuck subscriber never stalls the feed or its siblings: when a queue is
//! full the oldest tick is discarded (stale prices are worthless in a live
//! engine, stalling is not an option).

mod error;
mod feed;
mod subscription;

pub use error::FeedError;
pub use feed::{FeedConfig, FeedSnapshot, MarketFeed};
pub use subscription::{subscription, SendStatus, TickReceiver, TickSender};
