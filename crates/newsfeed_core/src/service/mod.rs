//! Core use-case services.
//!
//! # Responsibility
//! - Run one ingestion cycle end to end (`ingest_service`).
//! - Expose read-side queries and flag mutations (`news_service`).
//! - Keep scheduler and bridge layers decoupled from storage details.

pub mod ingest_service;
pub mod news_service;
