//! Cycle scheduling.
//!
//! # Responsibility
//! - Run at most one ingestion cycle at a time.
//! - Drive periodic cycles and publish completion notices.

pub mod cycle;

pub use cycle::{
    CycleNotice, CycleRunner, CycleScheduler, SchedulerStatus, TriggerKind, NOTICE_CAPACITY,
};
