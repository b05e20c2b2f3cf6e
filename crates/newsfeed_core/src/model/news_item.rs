//! News item domain model.
//!
//! # Responsibility
//! - Define the persisted `NewsItem` record and the `CandidateItem` produced
//!   by normalization.
//! - Validate candidates before they reach SQL.
//!
//! # Invariants
//! - `source`, `title` and `link` are never empty.
//! - `ingested_at` is assigned by the store, never by the feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Surrogate key assigned by the store.
pub type NewsItemId = i64;

/// Persisted news item as seen by readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: NewsItemId,
    /// Display name of the feed source this item came from.
    pub source: String,
    pub title: String,
    /// Canonical entry URL.
    pub link: String,
    /// HTML-unescaped summary, possibly still carrying markup.
    pub summary: Option<String>,
    /// Feed-provided publication time, or the ingesting cycle's time.
    pub published_at: DateTime<Utc>,
    /// Set once at insert time; drives listing order and retention.
    pub ingested_at: DateTime<Utc>,
    pub is_read: bool,
    pub is_favorite: bool,
}

impl NewsItem {
    /// Returns whether retention trimming may evict this item.
    pub fn is_evictable(&self) -> bool {
        !self.is_favorite
    }
}

/// Normalized entry waiting for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    pub source: String,
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl CandidateItem {
    /// Validates the fields required by the storage schema.
    pub fn validate(&self) -> Result<(), NewsItemValidationError> {
        if self.source.trim().is_empty() {
            return Err(NewsItemValidationError::EmptySource);
        }
        if self.title.trim().is_empty() {
            return Err(NewsItemValidationError::EmptyTitle {
                source: self.source.clone(),
            });
        }
        if self.link.trim().is_empty() {
            return Err(NewsItemValidationError::EmptyLink {
                source: self.source.clone(),
                title: self.title.clone(),
            });
        }
        Ok(())
    }
}

/// Candidate rejected before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewsItemValidationError {
    EmptySource,
    EmptyTitle { source: String },
    EmptyLink { source: String, title: String },
}

impl Display for NewsItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySource => write!(f, "news item source must not be empty"),
            Self::EmptyTitle { source } => {
                write!(f, "news item from `{source}` has an empty title")
            }
            Self::EmptyLink { source, title } => {
                write!(f, "news item `{title}` from `{source}` has an empty link")
            }
        }
    }
}

impl Error for NewsItemValidationError {}
