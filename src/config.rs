use crate::Error;
use std::time::Duration;

/// Tuning knobs of the component id store. Both tiers expire independently: the cache by
/// capacity and idle time, the database by `retention_threshold` checked every `sweep_period`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentIdStoreConfig {
    /// Maximum number of payloads held in memory
    pub cache_capacity: u64,
    /// Cached payloads not accessed for this long are dropped from memory
    pub cache_access_ttl: Duration,
    pub sweep_initial_delay: Duration,
    pub sweep_period: Duration,
    /// Regular records not used for this long are deleted by the next sweep
    pub retention_threshold: Duration,
}

const DAY: u64 = 24 * 60 * 60;

impl Default for ComponentIdStoreConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1_000,
            cache_access_ttl: Duration::from_secs(2 * 60 * 60),
            sweep_initial_delay: Duration::from_secs(60),
            sweep_period: Duration::from_secs(15 * 60),
            retention_threshold: Duration::from_secs(20 * DAY),
        }
    }
}

impl ComponentIdStoreConfig {
    /// Reads the `COMPONENT_ID_*` environment variables, using the default for each one that is
    /// not set. Durations are written like `15m` or `20days`.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let defaults = Self::default();
        let duration = |name: &str, default: Duration| -> Result<Duration, Error> {
            match lookup(name) {
                Some(value) => humantime::parse_duration(value.trim())
                    .map_err(|e| format!("Invalid {}: {}", name, e).into()),
                None => Ok(default),
            }
        };

        let cache_capacity = match lookup("COMPONENT_ID_CACHE_CAPACITY") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|e| format!("Invalid COMPONENT_ID_CACHE_CAPACITY: {}", e))?,
            None => defaults.cache_capacity,
        };

        let config = Self {
            cache_capacity,
            cache_access_ttl: duration("COMPONENT_ID_CACHE_ACCESS_TTL", defaults.cache_access_ttl)?,
            sweep_initial_delay: duration(
                "COMPONENT_ID_SWEEP_INITIAL_DELAY",
                defaults.sweep_initial_delay,
            )?,
            sweep_period: duration("COMPONENT_ID_SWEEP_PERIOD", defaults.sweep_period)?,
            retention_threshold: duration("COMPONENT_ID_RETENTION", defaults.retention_threshold)?,
        };

        if config.sweep_period.is_zero() {
            return Err("Invalid COMPONENT_ID_SWEEP_PERIOD: must not be zero".into());
        }
        Ok(config)
    }
}
