//! Trading engine entry point.
//!
//! Loads configuration and the strategy file, wires the engine together,
//! and runs until market close or an operator signal.
//!
//! # Usage
//!
//! ```bash
//! STRATEGIES_FILE=strategies.json MARKET_CLOSE=15:20 trading-engine
//! ```
//!
//! Exit codes: 0 on a normal shutdown (including abandoned runners),
//! 1 on a configuration or strategy-file error, 2 on an orchestrator
//! failure.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use common::{EngineConfig, SharedClock, SystemClock};
use engine::{load_strategies, Engine};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present, before reading any configuration.
    match dotenvy::dotenv() {
        Ok(path) => eprintln!("Loaded environment from: {}", path.display()),
        Err(dotenvy::Error::Io(_)) => {} // No .env file, that's fine
        Err(e) => eprintln!("Warning: failed to load .env file: {}", e),
    }

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::from(1);
        }
    };

    common::init_logging(&config.log_level);
    println!("{}\n", config);

    let strategies = match load_strategies(&config.strategies_file) {
        Ok(strategies) => strategies,
        Err(e) => {
            error!(error = %e, "failed to load strategies");
            return ExitCode::from(1);
        }
    };
    info!(
        count = strategies.len(),
        path = %config.strategies_file.display(),
        "loaded strategies"
    );

    let clock: SharedClock = Arc::new(SystemClock);
    let engine = match Engine::new(config, clock, strategies) {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "engine startup failed");
            return ExitCode::from(1);
        }
    };

    // Run in a task so an orchestrator panic surfaces as an exit code
    // instead of an abort.
    match tokio::spawn(engine.run()).await {
        Ok(summary) => {
            println!("\n{}", summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "orchestrator failed");
            ExitCode::from(2)
        }
    }
}
