//! Feed source registry.
//!
//! # Responsibility
//! - Turn configured `(name, endpoint)` pairs into validated feed sources.
//!
//! # Invariants
//! - The registry is immutable once built and keeps configuration order.
//! - Source names are unique; they are stored on every ingested item.

pub mod registry;

pub use registry::{FeedSource, RegistryError, SourceRegistry};
