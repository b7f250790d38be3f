//! Configuration loading and representation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use warden_observability::LoggingConfig;

use crate::event_store::{EventStore, InMemoryEventStore, PostgresEventStore};

/// Environment variable prefix; nested keys are separated by `__`
/// (e.g. `WARDEN__EVENT_STORE__BACKEND=postgres`).
pub const ENV_PREFIX: &str = "WARDEN";

/// Main process configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WardenConfig {
    #[serde(default)]
    pub event_store: EventStoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventStoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// PostgreSQL connection URL; required for the postgres backend.
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            database_url: None,
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

fn default_max_connections() -> u32 { 10 }
fn default_acquire_timeout_secs() -> u64 { 5 }

impl WardenConfig {
    /// Load configuration from the environment only.
    pub fn load() -> anyhow::Result<Self> {
        Self::build(config::Config::builder().add_source(env_source()))
    }

    /// Load from a file, overridden by the environment.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        Self::build(
            config::Config::builder()
                .add_source(config::File::with_name(path))
                .add_source(env_source()),
        )
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> anyhow::Result<Self> {
        let cfg: WardenConfig = builder
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")?;
        Ok(cfg)
    }

    /// Build the configured event store backend.
    ///
    /// The postgres backend connects and applies the bundled migrations.
    pub async fn connect_store(&self) -> anyhow::Result<Arc<dyn EventStore>> {
        let cfg = &self.event_store;
        match cfg.backend {
            StoreBackend::Memory => {
                tracing::info!("using in-memory event store");
                Ok(Arc::new(InMemoryEventStore::new()))
            }
            StoreBackend::Postgres => {
                let url = cfg
                    .database_url
                    .as_deref()
                    .context("event_store.database_url is required for the postgres backend")?;
                let store = PostgresEventStore::connect(
                    url,
                    cfg.max_connections,
                    Duration::from_secs(cfg.acquire_timeout_secs),
                )
                .await?;
                store.migrate().await?;
                Ok(Arc::new(store))
            }
        }
    }
}

fn env_source() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}
