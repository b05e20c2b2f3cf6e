//! Item store: repository contract, SQLite implementation and retention.
//!
//! # Responsibility
//! - Persist news items with insert-or-ignore semantics on `(source, title)`.
//! - Apply the retention trim in the same transaction as the batch insert.
//! - Serve read-side queries and flag mutations.
//!
//! # Invariants
//! - Existing rows are never overwritten by ingestion (first write wins).
//! - After a committed cycle, non-favorited rows never exceed the limit.
//! - Favorited rows are neither counted nor evicted by the trim.

pub mod news_repo;
pub mod retention;
pub mod store;
