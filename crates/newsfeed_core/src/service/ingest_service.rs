//! Ingestion cycle: fetch every source, normalize, commit.
//!
//! # Responsibility
//! - Fan out per-source fetches with bounded concurrency.
//! - Collect every outcome before the single store transaction begins.
//! - Report inserted/evicted counts and per-source status.
//!
//! # Invariants
//! - A skipped source never fails the cycle.
//! - Only store failures surface as `IngestError`; the store then keeps its
//!   pre-cycle state.

use crate::config::EngineConfig;
use crate::feed::{fetch_source, normalize, FeedFetcher, RetryPolicy, Skipped, SourceOutcome};
use crate::repo::news_repo::{NewsRepository, RepoError};
use crate::repo::retention::RetentionPolicy;
use crate::repo::store::NewsStore;
use crate::scheduler::CycleRunner;
use crate::source::SourceRegistry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Cycle-level failure. Only the store can produce one.
#[derive(Debug)]
pub enum IngestError {
    Store(RepoError),
    /// The blocking store task was cancelled or panicked.
    Worker(String),
}

impl Display for IngestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "store transaction failed: {err}"),
            Self::Worker(message) => write!(f, "store worker failed: {message}"),
        }
    }
}

impl Error for IngestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Worker(_) => None,
        }
    }
}

impl From<RepoError> for IngestError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

/// What happened to one source during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Fetched {
        /// Entries in the parsed document.
        entries: usize,
        /// Entries that survived normalization.
        candidates: usize,
    },
    Skipped {
        attempts: u32,
        last_error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub name: String,
    pub status: SourceStatus,
}

/// Outcome of one committed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Rows actually inserted; duplicates are not counted.
    pub inserted: usize,
    /// Non-favorited rows removed by the retention trim.
    pub evicted: usize,
    /// Entries dropped for a missing title or link.
    pub dropped_entries: usize,
    /// Per-source status in registry order.
    pub sources: Vec<SourceReport>,
    /// Cycle time, also used as `ingested_at` for inserted rows.
    pub cycle_time: DateTime<Utc>,
}

impl CycleReport {
    pub fn skipped_sources(&self) -> usize {
        self.sources
            .iter()
            .filter(|report| matches!(report.status, SourceStatus::Skipped { .. }))
            .count()
    }
}

/// Tunables for one ingestion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSettings {
    pub retry: RetryPolicy,
    pub retention: RetentionPolicy,
    pub max_concurrent_fetches: usize,
}

impl IngestSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            retry: RetryPolicy {
                attempts: config.fetch_attempts,
                delay: config.retry_delay(),
            },
            retention: RetentionPolicy::new(config.retention_limit),
            max_concurrent_fetches: config.max_concurrent_fetches,
        }
    }
}

/// Runs ingestion cycles against one registry and store.
pub struct IngestService {
    registry: Arc<SourceRegistry>,
    fetcher: Arc<dyn FeedFetcher>,
    store: NewsStore,
    settings: IngestSettings,
}

impl IngestService {
    pub fn new(
        registry: Arc<SourceRegistry>,
        fetcher: Arc<dyn FeedFetcher>,
        store: NewsStore,
        settings: IngestSettings,
    ) -> Self {
        Self {
            registry,
            fetcher,
            store,
            settings,
        }
    }

    /// Runs one full cycle.
    pub async fn run_cycle(&self) -> Result<CycleReport, IngestError> {
        let cycle_time = Utc::now();
        let started_at = Instant::now();
        info!(
            "event=ingest_cycle module=service status=start sources={}",
            self.registry.len()
        );

        let outcomes = self.fetch_all().await;

        let mut candidates = Vec::new();
        let mut sources = Vec::with_capacity(outcomes.len());
        let mut dropped_entries = 0;
        for (source, outcome) in self.registry.iter().zip(outcomes) {
            let status = match outcome {
                Ok(document) => {
                    let batch = normalize(&document, source.name(), cycle_time);
                    dropped_entries += batch.dropped;
                    let status = SourceStatus::Fetched {
                        entries: document.len(),
                        candidates: batch.items.len(),
                    };
                    candidates.extend(batch.items);
                    status
                }
                Err(skipped) => SourceStatus::Skipped {
                    attempts: skipped.attempts,
                    last_error: skipped.last_error,
                },
            };
            sources.push(SourceReport {
                name: source.name().to_string(),
                status,
            });
        }

        let store = self.store.clone();
        let retention = self.settings.retention;
        let candidate_count = candidates.len();
        let commit = tokio::task::spawn_blocking(move || {
            store.with_repo(|repo| repo.commit_cycle(&candidates, cycle_time, &retention))
        })
        .await
        .map_err(|err| IngestError::Worker(err.to_string()))
        .and_then(|result| result.map_err(IngestError::Store));

        let commit = match commit {
            Ok(commit) => commit,
            Err(err) => {
                error!(
                    "event=ingest_cycle module=service status=error candidates={} duration_ms={} error={}",
                    candidate_count,
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };

        let report = CycleReport {
            inserted: commit.inserted,
            evicted: commit.evicted,
            dropped_entries,
            sources,
            cycle_time,
        };
        info!(
            "event=ingest_cycle module=service status=ok candidates={} inserted={} evicted={} dropped={} skipped_sources={} duration_ms={}",
            candidate_count,
            report.inserted,
            report.evicted,
            report.dropped_entries,
            report.skipped_sources(),
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    /// Fetches every source; the result is in registry order.
    async fn fetch_all(&self) -> Vec<SourceOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_fetches.max(1)));
        let mut tasks = JoinSet::new();

        for (index, source) in self.registry.iter().cloned().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&semaphore);
            let retry = self.settings.retry;
            tasks.spawn(async move {
                // The semaphore is never closed, so acquisition cannot fail.
                let _permit = semaphore.acquire_owned().await;
                (index, fetch_source(fetcher.as_ref(), &source, &retry).await)
            });
        }

        let mut outcomes: Vec<Option<SourceOutcome>> =
            (0..self.registry.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(err) => warn!(
                    "event=feed_fetch module=service status=error error_code=fetch_task_failed error={}",
                    err
                ),
            }
        }

        outcomes
            .into_iter()
            .map(|outcome| {
                outcome.unwrap_or_else(|| {
                    Err(Skipped {
                        attempts: 0,
                        last_error: "fetch task did not complete".to_string(),
                    })
                })
            })
            .collect()
    }
}

#[async_trait]
impl CycleRunner for IngestService {
    async fn run_cycle(&self) -> Result<CycleReport, IngestError> {
        IngestService::run_cycle(self).await
    }
}
