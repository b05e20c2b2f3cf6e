//! Engine facade used by the presentation bridge.
//!
//! # Responsibility
//! - Wire configuration, registry, store, ingestion and scheduler together.
//! - Offer the presentation-facing operations in one place.
//!
//! # Invariants
//! - Read-side calls never wait for network activity; they only contend
//!   for the store lock while a cycle commits.

use crate::config::{ConfigError, EngineConfig};
use crate::feed::{FeedFetcher, FetchError, HttpFeedFetcher};
use crate::model::news_item::{NewsItem, NewsItemId};
use crate::repo::news_repo::SqliteNewsRepository;
use crate::repo::store::NewsStore;
use crate::scheduler::{CycleNotice, CycleScheduler, SchedulerStatus, TriggerKind};
use crate::service::ingest_service::{IngestService, IngestSettings};
use crate::service::news_service::{NewsFilter, NewsService, NewsServiceError};
use crate::source::{RegistryError, SourceRegistry};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast;

/// Engine start-up failure.
#[derive(Debug)]
pub enum EngineError {
    Config(ConfigError),
    Registry(RegistryError),
    Fetcher(FetchError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Registry(err) => write!(f, "{err}"),
            Self::Fetcher(err) => write!(f, "cannot build feed fetcher: {err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Registry(err) => Some(err),
            Self::Fetcher(err) => Some(err),
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<RegistryError> for EngineError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

impl From<FetchError> for EngineError {
    fn from(value: FetchError) -> Self {
        Self::Fetcher(value)
    }
}

/// Running feed engine.
pub struct NewsEngine {
    config: EngineConfig,
    registry: Arc<SourceRegistry>,
    store: NewsStore,
    scheduler: CycleScheduler,
}

impl NewsEngine {
    /// Starts the engine and its refresh timer on `runtime`.
    pub fn start(
        config: EngineConfig,
        store: NewsStore,
        fetcher: Arc<dyn FeedFetcher>,
        runtime: Handle,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let registry = Arc::new(SourceRegistry::from_sources(&config.sources)?);
        let ingest = IngestService::new(
            Arc::clone(&registry),
            fetcher,
            store.clone(),
            IngestSettings::from_config(&config),
        );
        let scheduler = CycleScheduler::new(Arc::new(ingest), runtime);
        scheduler.start_timer(config.refresh_interval());

        info!(
            "event=engine_start module=engine status=ok sources={} retention_limit={} refresh_interval_secs={}",
            registry.len(),
            config.retention_limit,
            config.refresh_interval_secs
        );

        let engine = Self {
            config,
            registry,
            store,
            scheduler,
        };
        if engine.config.refresh_on_start {
            engine.scheduler.trigger(TriggerKind::Startup);
        }
        Ok(engine)
    }

    /// Starts the engine with the HTTP fetcher built from `config`.
    pub fn start_with_http(
        config: EngineConfig,
        store: NewsStore,
        runtime: Handle,
    ) -> Result<Self, EngineError> {
        let fetcher = HttpFeedFetcher::new(config.fetch_timeout(), &config.user_agent)?;
        Self::start(config, store, Arc::new(fetcher), runtime)
    }

    /// Requests a cycle now. Returns `false` when one is already running.
    pub fn trigger_cycle(&self) -> bool {
        self.scheduler.trigger(TriggerKind::Manual)
    }

    /// Subscribes to cycle completion notices.
    pub fn subscribe(&self) -> broadcast::Receiver<CycleNotice> {
        self.scheduler.subscribe()
    }

    pub fn status(&self) -> SchedulerStatus {
        self.scheduler.status()
    }

    pub fn is_cycle_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn list_items(&self, filter: &NewsFilter) -> Result<Vec<NewsItem>, NewsServiceError> {
        self.store.with_conn(|conn| {
            NewsService::new(SqliteNewsRepository::new(conn)).list_items(filter)
        })
    }

    pub fn get_item(&self, id: NewsItemId) -> Result<NewsItem, NewsServiceError> {
        self.store
            .with_conn(|conn| NewsService::new(SqliteNewsRepository::new(conn)).get_item(id))
    }

    pub fn set_read(&self, id: NewsItemId, value: bool) -> Result<(), NewsServiceError> {
        self.store.with_conn(|conn| {
            NewsService::new(SqliteNewsRepository::new(conn)).set_read(id, value)
        })
    }

    pub fn set_favorite(&self, id: NewsItemId, value: bool) -> Result<(), NewsServiceError> {
        self.store.with_conn(|conn| {
            NewsService::new(SqliteNewsRepository::new(conn)).set_favorite(id, value)
        })
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &NewsStore {
        &self.store
    }

    /// Stops periodic refresh. Manual triggers keep working.
    pub fn shutdown(&self) {
        self.scheduler.stop_timer();
        info!("event=engine_shutdown module=engine status=ok");
    }
}
