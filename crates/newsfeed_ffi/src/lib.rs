//! Flutter bridge for the news feed engine.

pub mod api;
