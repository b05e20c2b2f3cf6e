//! Shared handle over the engine-owned connection.
//!
//! # Invariants
//! - All access goes through one mutex, so a cycle transaction is never
//!   interleaved with another writer or observed half-written by a reader
//!   on this connection.

use crate::db::{open_db, open_db_in_memory};
use crate::repo::news_repo::{RepoError, RepoResult, SqliteNewsRepository};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Clonable handle to the persisted item store.
#[derive(Debug, Clone)]
pub struct NewsStore {
    conn: Arc<Mutex<Connection>>,
}

impl NewsStore {
    /// Wraps an already migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> RepoResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    /// Runs `f` with exclusive access to the connection.
    pub fn with_conn<T, E>(&self, f: impl FnOnce(&mut Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepoError>,
    {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| E::from(RepoError::LockPoisoned))?;
        f(&mut guard)
    }

    /// Runs `f` against a repository bound to the locked connection.
    pub fn with_repo<T>(
        &self,
        f: impl FnOnce(&mut SqliteNewsRepository<'_>) -> RepoResult<T>,
    ) -> RepoResult<T> {
        self.with_conn(|conn| {
            let mut repo = SqliteNewsRepository::new(conn);
            f(&mut repo)
        })
    }
}
