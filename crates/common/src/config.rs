//! Engine configuration from environment variables.
//!
//! Every recognized variable is optional; invalid values are fatal at
//! startup, before any task is spawned.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;
use thiserror::Error;

/// A configuration variable that failed validation.
#[derive(Debug, Clone, Error)]
#[error("invalid {name}='{value}': {reason}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
    pub reason: String,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Runners do not start before this local time of day.
    pub market_open: Option<NaiveTime>,
    /// Shutdown triggers at the next occurrence of this local time of day.
    pub market_close: Option<NaiveTime>,
    /// Cadence of simulated ticks.
    pub tick_interval: Duration,
    /// Uniform half-width of the per-tick return.
    pub volatility: f64,
    /// Path to the strategy file.
    pub strategies_file: PathBuf,
    /// Default log level (RUST_LOG overrides).
    pub log_level: String,
    /// Cadence of health reports.
    pub health_interval: Duration,
    /// Per-subscriber tick queue size.
    pub subscription_capacity: usize,
    /// How long runners get to force-close at shutdown.
    pub shutdown_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            market_open: None,
            market_close: None,
            tick_interval: Duration::from_secs(1),
            volatility: 0.002,
            strategies_file: PathBuf::from("strategies.json"),
            log_level: "info".to_string(),
            health_interval: Duration::from_secs(30),
            subscription_capacity: 64,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl EngineConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("MARKET_OPEN") {
            config.market_open = Some(parse_time("MARKET_OPEN", &value)?);
        }
        if let Some(value) = lookup("MARKET_CLOSE") {
            config.market_close = Some(parse_time("MARKET_CLOSE", &value)?);
        }
        if let Some(value) = lookup("TICK_INTERVAL") {
            let secs: f64 = parse_number("TICK_INTERVAL", &value)?;
            if !secs.is_finite() || secs <= 0.0 {
                return Err(invalid("TICK_INTERVAL", &value, "must be positive"));
            }
            config.tick_interval = Duration::from_secs_f64(secs);
        }
        if let Some(value) = lookup("PRICE_VOLATILITY") {
            let vol: f64 = parse_number("PRICE_VOLATILITY", &value)?;
            if !vol.is_finite() || !(0.0..1.0).contains(&vol) {
                return Err(invalid("PRICE_VOLATILITY", &value, "must be in [0, 1)"));
            }
            config.volatility = vol;
        }
        if let Some(value) = lookup("STRATEGIES_FILE") {
            config.strategies_file = PathBuf::from(value);
        }
        if let Some(value) = lookup("LOG_LEVEL") {
            let level = value.to_lowercase();
            if !matches!(level.as_str(), "debug" | "info" | "warn" | "error") {
                return Err(invalid(
                    "LOG_LEVEL",
                    &value,
                    "expected DEBUG, INFO, WARN, or ERROR",
                ));
            }
            config.log_level = level;
        }
        if let Some(value) = lookup("HEALTH_INTERVAL") {
            let secs: f64 = parse_number("HEALTH_INTERVAL", &value)?;
            if !secs.is_finite() || secs <= 0.0 {
                return Err(invalid("HEALTH_INTERVAL", &value, "must be positive"));
            }
            config.health_interval = Duration::from_secs_f64(secs);
        }
        if let Some(value) = lookup("SUBSCRIPTION_CAPACITY") {
            let capacity: usize = parse_number("SUBSCRIPTION_CAPACITY", &value)?;
            if capacity == 0 {
                return Err(invalid("SUBSCRIPTION_CAPACITY", &value, "must be positive"));
            }
            config.subscription_capacity = capacity;
        }
        if let Some(value) = lookup("SHUTDOWN_GRACE") {
            let secs: f64 = parse_number("SHUTDOWN_GRACE", &value)?;
            if !secs.is_finite() || secs < 0.0 {
                return Err(invalid("SHUTDOWN_GRACE", &value, "must be non-negative"));
            }
            config.shutdown_grace = Duration::from_secs_f64(secs);
        }

        Ok(config)
    }
}

impl fmt::Display for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt_time = |t: &Option<NaiveTime>| {
            t.map(|t| t.format("%H:%M").to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        writeln!(f, "=== Configuration ===")?;
        writeln!(
            f,
            "Market hours:       {} - {}",
            fmt_time(&self.market_open),
            fmt_time(&self.market_close)
        )?;
        writeln!(f, "Tick interval:      {:?}", self.tick_interval)?;
        writeln!(f, "Price volatility:   {}%", self.volatility * 100.0)?;
        writeln!(f, "Strategies file:    {}", self.strategies_file.display())?;
        writeln!(f, "Log level:          {}", self.log_level)?;
        writeln!(f, "Health interval:    {:?}", self.health_interval)?;
        writeln!(f, "Queue capacity:     {}", self.subscription_capacity)?;
        write!(f, "Shutdown grace:     {:?}", self.shutdown_grace)
    }
}

fn invalid(name: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_time(name: &'static str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| invalid(name, value, "expected HH:MM"))
}

fn parse_number<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .parse::<T>()
        .map_err(|_| invalid(name, value, "not a valid number"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> Result<EngineConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_vars(&[]).unwrap();
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.subscription_capacity, 64);
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
        assert!(config.market_close.is_none());
    }

    #[test]
    fn test_full_configuration() {
        let config = from_vars(&[
            ("MARKET_OPEN", "09:15"),
            ("MARKET_CLOSE", "15:20"),
            ("TICK_INTERVAL", "0.5"),
            ("PRICE_VOLATILITY", "0.01"),
            ("STRATEGIES_FILE", "/tmp/strategies.json"),
            ("LOG_LEVEL", "DEBUG"),
            ("HEALTH_INTERVAL", "10"),
            ("SUBSCRIPTION_CAPACITY", "128"),
            ("SHUTDOWN_GRACE", "2"),
        ])
        .unwrap();

        assert_eq!(config.market_open, NaiveTime::from_hms_opt(9, 15, 0));
        assert_eq!(config.market_close, NaiveTime::from_hms_opt(15, 20, 0));
        assert_eq!(config.tick_interval, Duration::from_millis(500));
        assert_eq!(config.volatility, 0.01);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.subscription_capacity, 128);
    }

    #[test]
    fn test_invalid_time() {
        let err = from_vars(&[("MARKET_CLOSE", "25:99")]).unwrap_err();
        assert_eq!(err.name, "MARKET_CLOSE");
    }

    #[test]
    fn test_non_positive_tick_interval() {
        assert!(from_vars(&[("TICK_INTERVAL", "0")]).is_err());
        assert!(from_vars(&[("TICK_INTERVAL", "-1")]).is_err());
        assert!(from_vars(&[("TICK_INTERVAL", "abc")]).is_err());
    }

    #[test]
    fn test_volatility_range() {
        assert!(from_vars(&[("PRICE_VOLATILITY", "1.5")]).is_err());
        assert!(from_vars(&[("PRICE_VOLATILITY", "-0.1")]).is_err());
        assert!(from_vars(&[("PRICE_VOLATILITY", "0")]).is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let err = from_vars(&[("LOG_LEVEL", "verbose")]).unwrap_err();
        assert!(err.reason.contains("expected"));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(from_vars(&[("SUBSCRIPTION_CAPACITY", "0")]).is_err());
    }
}
