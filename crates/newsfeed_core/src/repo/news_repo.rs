//! News item repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Commit one ingestion cycle (batch insert + retention trim) atomically.
//! - Provide list/get/count and flag mutations for the presentation layer.
//!
//! # Invariants
//! - Write paths call `CandidateItem::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Listing order is `ingested_at DESC, id ASC`: newest cycle first, feed
//!   order inside one cycle.

use crate::db::DbError;
use crate::model::news_item::{CandidateItem, NewsItem, NewsItemId, NewsItemValidationError};
use crate::repo::retention::{trim_retention, RetentionPolicy};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const NEWS_SELECT_SQL: &str = "SELECT
    id,
    source,
    title,
    link,
    summary,
    published_at,
    ingested_at,
    is_read,
    is_favorite
FROM news_items";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for news persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(NewsItemValidationError),
    Db(DbError),
    NotFound(NewsItemId),
    InvalidData(String),
    /// A previous holder of the store lock panicked.
    LockPoisoned,
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "news item not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted news data: {message}"),
            Self::LockPoisoned => write!(f, "news store lock poisoned"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) | Self::LockPoisoned => None,
        }
    }
}

impl From<NewsItemValidationError> for RepoError {
    fn from(value: NewsItemValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Rows touched by one committed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleCommit {
    pub inserted: usize,
    pub evicted: usize,
}

/// Query options for listing items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsListQuery {
    /// Exact source name match.
    pub source: Option<String>,
    /// Case-insensitive substring over title and summary.
    pub text: Option<String>,
    /// Inclusive lower bound on `published_at`.
    pub published_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `published_at`.
    pub published_before: Option<DateTime<Utc>>,
    pub favorite_only: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for news items.
pub trait NewsRepository {
    /// Inserts new candidates and trims retention in one transaction.
    fn commit_cycle(
        &mut self,
        candidates: &[CandidateItem],
        ingested_at: DateTime<Utc>,
        policy: &RetentionPolicy,
    ) -> RepoResult<CycleCommit>;
    fn get_item(&self, id: NewsItemId) -> RepoResult<Option<NewsItem>>;
    fn list_items(&self, query: &NewsListQuery) -> RepoResult<Vec<NewsItem>>;
    /// Counts rows, optionally restricted to one favorite flag value.
    fn count_items(&self, favorite: Option<bool>) -> RepoResult<u64>;
    fn set_read(&self, id: NewsItemId, value: bool) -> RepoResult<()>;
    fn set_favorite(&self, id: NewsItemId, value: bool) -> RepoResult<()>;
}

/// SQLite-backed news repository.
pub struct SqliteNewsRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteNewsRepository<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }
}

impl NewsRepository for SqliteNewsRepository<'_> {
    fn commit_cycle(
        &mut self,
        candidates: &[CandidateItem],
        ingested_at: DateTime<Utc>,
        policy: &RetentionPolicy,
    ) -> RepoResult<CycleCommit> {
        let started_at = Instant::now();
        let result = commit_in_transaction(self.conn, candidates, ingested_at, policy);

        match &result {
            Ok(commit) => info!(
                "event=cycle_commit module=repo status=ok candidates={} inserted={} evicted={} duration_ms={}",
                candidates.len(),
                commit.inserted,
                commit.evicted,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=cycle_commit module=repo status=error candidates={} duration_ms={} error_code=commit_rolled_back error={}",
                candidates.len(),
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn get_item(&self, id: NewsItemId) -> RepoResult<Option<NewsItem>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NEWS_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_news_row(row)?));
        }
        Ok(None)
    }

    fn list_items(&self, query: &NewsListQuery) -> RepoResult<Vec<NewsItem>> {
        let mut sql = format!("{NEWS_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(source) = query.source.as_ref() {
            sql.push_str(" AND source = ?");
            bind_values.push(Value::Text(source.clone()));
        }
        if let Some(from) = query.published_from {
            sql.push_str(" AND published_at >= ?");
            bind_values.push(Value::Integer(from.timestamp_millis()));
        }
        if let Some(before) = query.published_before {
            sql.push_str(" AND published_at < ?");
            bind_values.push(Value::Integer(before.timestamp_millis()));
        }
        if query.favorite_only {
            sql.push_str(" AND is_favorite = 1");
        }

        sql.push_str(" ORDER BY ingested_at DESC, id ASC");

        // SQLite's lower() only folds ASCII, so text matching happens here
        // and pagination has to follow it.
        let needle = query
            .text
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_lowercase);

        if needle.is_none() {
            push_pagination(&mut sql, &mut bind_values, query.limit, query.offset);
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_news_row(row)?);
        }

        let Some(needle) = needle else {
            return Ok(items);
        };

        let matching = items
            .into_iter()
            .filter(|item| matches_text(item, &needle))
            .skip(query.offset as usize);
        Ok(match query.limit {
            Some(limit) => matching.take(limit as usize).collect(),
            None => matching.collect(),
        })
    }

    fn count_items(&self, favorite: Option<bool>) -> RepoResult<u64> {
        let count: i64 = match favorite {
            Some(value) => self.conn.query_row(
                "SELECT COUNT(*) FROM news_items WHERE is_favorite = ?1;",
                [bool_to_int(value)],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM news_items;", [], |row| row.get(0))?,
        };
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative row count `{count}`")))
    }

    fn set_read(&self, id: NewsItemId, value: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE news_items SET is_read = ?1 WHERE id = ?2;",
            params![bool_to_int(value), id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn set_favorite(&self, id: NewsItemId, value: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE news_items SET is_favorite = ?1 WHERE id = ?2;",
            params![bool_to_int(value), id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}

fn commit_in_transaction(
    conn: &mut Connection,
    candidates: &[CandidateItem],
    ingested_at: DateTime<Utc>,
    policy: &RetentionPolicy,
) -> RepoResult<CycleCommit> {
    // Dropping the transaction on an early return rolls it back.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let inserted = insert_batch(&tx, candidates, ingested_at)?;
    let evicted = trim_retention(&tx, policy)?;
    tx.commit()?;
    Ok(CycleCommit { inserted, evicted })
}

/// Inserts candidates that are not yet stored for their `(source, title)`.
///
/// Must run inside the cycle transaction. Returns the number of rows
/// actually inserted; ignored duplicates are not counted.
pub fn insert_batch(
    conn: &Connection,
    candidates: &[CandidateItem],
    ingested_at: DateTime<Utc>,
) -> RepoResult<usize> {
    for candidate in candidates {
        candidate.validate()?;
    }

    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO news_items (
            source,
            title,
            link,
            summary,
            published_at,
            ingested_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
    )?;

    let ingested_ms = ingested_at.timestamp_millis();
    let mut inserted = 0;
    for candidate in candidates {
        inserted += stmt.execute(params![
            candidate.source.as_str(),
            candidate.title.as_str(),
            candidate.link.as_str(),
            candidate.summary.as_deref(),
            candidate.published_at.timestamp_millis(),
            ingested_ms,
        ])?;
    }

    Ok(inserted)
}

fn push_pagination(
    sql: &mut String,
    bind_values: &mut Vec<Value>,
    limit: Option<u32>,
    offset: u32,
) {
    if let Some(limit) = limit {
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
        if offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(offset)));
        }
    } else if offset > 0 {
        sql.push_str(" LIMIT -1 OFFSET ?");
        bind_values.push(Value::Integer(i64::from(offset)));
    }
}

fn matches_text(item: &NewsItem, needle: &str) -> bool {
    item.title.to_lowercase().contains(needle)
        || item
            .summary
            .as_deref()
            .is_some_and(|summary| summary.to_lowercase().contains(needle))
}

fn parse_news_row(row: &Row<'_>) -> RepoResult<NewsItem> {
    let id: NewsItemId = row.get("id")?;
    Ok(NewsItem {
        id,
        source: row.get("source")?,
        title: row.get("title")?,
        link: row.get("link")?,
        summary: row.get("summary")?,
        published_at: parse_timestamp(row.get("published_at")?, "published_at", id)?,
        ingested_at: parse_timestamp(row.get("ingested_at")?, "ingested_at", id)?,
        is_read: parse_flag(row.get("is_read")?, "is_read", id)?,
        is_favorite: parse_flag(row.get("is_favorite")?, "is_favorite", id)?,
    })
}

fn parse_timestamp(value: i64, column: &str, id: NewsItemId) -> RepoResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(value).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid timestamp `{value}` in news_items.{column} for id {id}"
        ))
    })
}

fn parse_flag(value: i64, column: &str, id: NewsItemId) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag `{other}` in news_items.{column} for id {id}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
