use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub max_connections: u32,
    pub timeout_ms: u64,
}

impl StoreConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Longest span, in days, a timer listing may cover.
    pub max_range_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_range_days: 31 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl JobConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        // Half-hour ticks so +05:30 midnight (18:30 UTC) is reached.
        Self {
            enabled: true,
            interval_secs: 30 * 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub store: StoreConfig,
    pub engine: EngineConfig,
    pub job: JobConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let store = StoreConfig {
            max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            timeout_ms: env_or("STORE_TIMEOUT_MS", 5_000),
        };
        let engine = EngineConfig {
            max_range_days: env_or("REPORT_MAX_RANGE_DAYS", EngineConfig::default().max_range_days),
        };
        let job = JobConfig {
            enabled: env_or("PROLONG_ENABLED", true),
            interval_secs: env_or("PROLONG_INTERVAL_SECS", JobConfig::default().interval_secs),
        };
        anyhow::ensure!(job.interval_secs > 0, "PROLONG_INTERVAL_SECS must be positive");
        Ok(Self {
            database_url,
            store,
            engine,
            job,
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
