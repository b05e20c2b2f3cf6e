//! Domain model for ingested news items.
//!
//! # Responsibility
//! - Define the typed records flowing from normalization into storage and
//!   out to the presentation layer.
//!
//! # Invariants
//! - `(source, title)` identifies one stored item.
//! - Items are created only by ingestion cycles; callers mutate flags only.

pub mod news_item;
