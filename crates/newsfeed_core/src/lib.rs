//! Core of the news feed engine: source registry, feed fetching and
//! normalization, the SQLite news store, and the single-flight ingestion
//! scheduler.

pub mod config;
pub mod db;
pub mod engine;
pub mod feed;
pub mod logging;
pub mod model;
pub mod repo;
pub mod scheduler;
pub mod service;
pub mod source;

pub use config::{ConfigError, EngineConfig, SourceConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use engine::{EngineError, NewsEngine};
pub use feed::{FeedDocument, FeedFetcher, FetchError, HttpFeedFetcher, RetryPolicy};
pub use logging::{init_logging, logging_status, LogLevel, LoggingError};
pub use model::news_item::{CandidateItem, NewsItem, NewsItemId, NewsItemValidationError};
pub use repo::news_repo::{
    CycleCommit, NewsListQuery, NewsRepository, RepoError, RepoResult, SqliteNewsRepository,
};
pub use repo::retention::RetentionPolicy;
pub use repo::store::NewsStore;
pub use scheduler::{CycleNotice, CycleRunner, CycleScheduler, SchedulerStatus, TriggerKind};
pub use service::ingest_service::{
    CycleReport, IngestError, IngestService, IngestSettings, SourceReport, SourceStatus,
};
pub use service::news_service::{NewsFilter, NewsService, NewsServiceError};
pub use source::{FeedSource, RegistryError, SourceRegistry};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
