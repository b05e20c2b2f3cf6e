//! Feed acquisition pipeline.
//!
//! # Responsibility
//! - Fetch one source with bounded retries (`fetch`).
//! - Parse RSS/Atom documents into a format-neutral shape (`document`).
//! - Turn raw entries into storage candidates (`normalize`).
//!
//! # Invariants
//! - Per-source and per-entry failures stay inside this module; callers only
//!   see "document" or "skipped".

pub mod document;
pub mod fetch;
pub mod normalize;

pub use document::{FeedDocument, FeedParseError, RawEntry};
pub use fetch::{
    fetch_source, FeedFetcher, FetchError, HttpFeedFetcher, RetryPolicy, Skipped, SourceOutcome,
};
pub use normalize::{normalize, unescape_html, NormalizedBatch};
