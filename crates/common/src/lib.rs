//! Shared infrastructure: wall-clock access, environment configuration,
//! and logging setup.

mod clock;
mod config;
mod logging;

pub use clock::{minutes_of, next_occurrence, Clock, ManualClock, SharedClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use logging::init_logging;
