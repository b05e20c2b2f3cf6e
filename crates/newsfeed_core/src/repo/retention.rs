//! Retention policy for non-favorited items.
//!
//! # Invariants
//! - Favorites are excluded from both the count and the eviction set.
//! - Eviction removes the oldest rows by `ingested_at` until exactly `limit`
//!   non-favorites remain. Within one cycle the last inserted rows go first,
//!   so the head of each feed survives.

use crate::repo::news_repo::RepoResult;
use log::info;
use rusqlite::Connection;

/// Retention cap applied after every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub limit: u32,
}

impl RetentionPolicy {
    pub fn new(limit: u32) -> Self {
        Self { limit }
    }

    /// Number of non-favorites that must go for `non_favorite_count` rows.
    pub fn overflow(&self, non_favorite_count: u64) -> u64 {
        non_favorite_count.saturating_sub(u64::from(self.limit))
    }
}

/// Deletes the oldest non-favorited rows above the limit.
///
/// Must run inside the cycle transaction; returns the number of rows
/// evicted.
pub fn trim_retention(conn: &Connection, policy: &RetentionPolicy) -> RepoResult<usize> {
    let non_favorites: i64 = conn.query_row(
        "SELECT COUNT(*) FROM news_items WHERE is_favorite = 0;",
        [],
        |row| row.get(0),
    )?;
    let overflow = policy.overflow(u64::try_from(non_favorites).unwrap_or(0));
    if overflow == 0 {
        return Ok(0);
    }

    let evicted = conn.execute(
        "DELETE FROM news_items
         WHERE id IN (
             SELECT id
             FROM news_items
             WHERE is_favorite = 0
             ORDER BY ingested_at ASC, id DESC
             LIMIT ?1
         );",
        [i64::try_from(overflow).unwrap_or(i64::MAX)],
    )?;

    info!(
        "event=retention_trim module=repo status=ok limit={} non_favorites={} evicted={}",
        policy.limit, non_favorites, evicted
    );
    Ok(evicted)
}
