use std::sync::Arc;

use sqlx::PgPool;

use crate::config::{AppConfig, EngineConfig, JobConfig, StoreConfig};
use crate::db;
use crate::timers::{Clock, MemoryTimerStore, PgTimerStore, SystemClock, TimerEngine, TimerStore};

#[derive(Clone)]
pub enum Backend {
    Postgres(PgPool),
    Memory(MemoryTimerStore),
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: Arc<TimerEngine>,
    pub backend: Backend,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let db = db::connect(&config).await?;
        let engine = Arc::new(TimerEngine::new(
            config.engine.clone(),
            Arc::new(SystemClock),
        ));
        Ok(Self {
            config,
            engine,
            backend: Backend::Postgres(db),
        })
    }

    /// In-memory state driven by the given clock.
    pub fn fake(clock: Arc<dyn Clock>) -> Self {
        let config = Arc::new(AppConfig {
            database_url: String::new(),
            store: StoreConfig {
                max_connections: 1,
                timeout_ms: 1_000,
            },
            engine: EngineConfig::default(),
            job: JobConfig::default(),
        });
        let engine = Arc::new(TimerEngine::new(config.engine.clone(), clock));
        Self {
            config,
            engine,
            backend: Backend::Memory(MemoryTimerStore::new()),
        }
    }

    /// Store handle for one request or one job step, with its own deadline.
    pub fn timer_store(&self) -> Box<dyn TimerStore> {
        match &self.backend {
            Backend::Postgres(db) => Box::new(PgTimerStore::new(
                db.clone(),
                self.config.store.request_timeout(),
            )),
            Backend::Memory(store) => Box::new(store.clone()),
        }
    }
}
