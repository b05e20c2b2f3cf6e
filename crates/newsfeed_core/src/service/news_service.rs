//! Read-side news use cases.
//!
//! # Responsibility
//! - Translate presentation filters into repository queries.
//! - Expose read/favorite flag updates with stable not-found errors.
//!
//! # Invariants
//! - Date filters are inclusive calendar days in UTC.
//! - Blank text queries behave like no text query.

use crate::model::news_item::{NewsItem, NewsItemId};
use crate::repo::news_repo::{NewsListQuery, NewsRepository, RepoError};
use chrono::{NaiveDate, TimeZone, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Presentation-level listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsFilter {
    pub source: Option<String>,
    /// Case-insensitive substring over title and summary.
    pub text_query: Option<String>,
    /// First publication day to include.
    pub date_from: Option<NaiveDate>,
    /// Last publication day to include.
    pub date_to: Option<NaiveDate>,
    pub favorite_only: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// News service error.
#[derive(Debug)]
pub enum NewsServiceError {
    /// Filter values are contradictory or out of range.
    InvalidFilter(String),
    /// Target item does not exist.
    ItemNotFound(NewsItemId),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for NewsServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFilter(message) => write!(f, "invalid news filter: {message}"),
            Self::ItemNotFound(id) => write!(f, "news item not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for NewsServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::InvalidFilter(_) | Self::ItemNotFound(_) => None,
        }
    }
}

impl From<RepoError> for NewsServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::ItemNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl NewsFilter {
    /// Converts the filter into a repository query.
    pub fn to_query(&self) -> Result<NewsListQuery, NewsServiceError> {
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(NewsServiceError::InvalidFilter(format!(
                    "date_from {from} is after date_to {to}"
                )));
            }
        }
        if self.limit == Some(0) {
            return Err(NewsServiceError::InvalidFilter(
                "limit must be at least 1".to_string(),
            ));
        }

        let text = self
            .text_query
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(ToString::to_string);
        let source = self
            .source
            .as_deref()
            .map(str::trim)
            .filter(|source| !source.is_empty())
            .map(ToString::to_string);

        Ok(NewsListQuery {
            source,
            text,
            published_from: self.date_from.map(start_of_day),
            // Past the last representable day there is no upper bound.
            published_before: self
                .date_to
                .and_then(|day| day.succ_opt())
                .map(start_of_day),
            favorite_only: self.favorite_only,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

fn start_of_day(day: NaiveDate) -> chrono::DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(chrono::NaiveTime::MIN))
}

/// Use-case service wrapper for news listing and flags.
pub struct NewsService<R: NewsRepository> {
    repo: R,
}

impl<R: NewsRepository> NewsService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Lists items newest cycle first.
    pub fn list_items(&self, filter: &NewsFilter) -> Result<Vec<NewsItem>, NewsServiceError> {
        let query = filter.to_query()?;
        Ok(self.repo.list_items(&query)?)
    }

    pub fn get_item(&self, id: NewsItemId) -> Result<NewsItem, NewsServiceError> {
        self.repo
            .get_item(id)?
            .ok_or(NewsServiceError::ItemNotFound(id))
    }

    pub fn set_read(&self, id: NewsItemId, value: bool) -> Result<(), NewsServiceError> {
        Ok(self.repo.set_read(id, value)?)
    }

    /// Marks or unmarks an item as favorite.
    ///
    /// Favorited items are exempt from retention trimming.
    pub fn set_favorite(&self, id: NewsItemId, value: bool) -> Result<(), NewsServiceError> {
        Ok(self.repo.set_favorite(id, value)?)
    }

    pub fn count_items(&self) -> Result<u64, NewsServiceError> {
        Ok(self.repo.count_items(None)?)
    }
}
