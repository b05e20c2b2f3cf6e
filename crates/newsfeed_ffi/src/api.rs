//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Own the process-wide engine and the tokio runtime it runs on.
//! - Expose listing, flag updates, manual refresh and cycle notices.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Sync functions never wait on network I/O.
//! - The engine is initialized at most once per process.

use chrono::NaiveDate;
use log::{info, warn};
use newsfeed_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    CycleNotice, EngineConfig, NewsEngine, NewsFilter, NewsItem, NewsStore,
};
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Mutex;

const RUNTIME_WORKER_THREADS: usize = 2;
const DATE_FORMAT: &str = "%Y-%m-%d";

static ENGINE_HOST: OnceCell<EngineHost> = OnceCell::new();

struct EngineHost {
    db_path: PathBuf,
    // Subscribed at start so no completion is missed between calls.
    notices: Mutex<broadcast::Receiver<CycleNotice>>,
    // Dropped before the runtime it spawns on.
    engine: NewsEngine,
    _runtime: Runtime,
}

/// Minimal health-check API for FRB smoke integration.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// # FFI contract
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory for rolling log files.
/// - Returns an empty string on success and an error message otherwise.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// One stored news item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItemView {
    pub id: i64,
    pub source: String,
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    /// Publication time in epoch milliseconds.
    pub published_at_ms: i64,
    /// Cycle time of the insert in epoch milliseconds.
    pub ingested_at_ms: i64,
    pub is_read: bool,
    pub is_favorite: bool,
}

impl From<NewsItem> for NewsItemView {
    fn from(item: NewsItem) -> Self {
        Self {
            id: item.id,
            source: item.source,
            title: item.title,
            link: item.link,
            summary: item.summary,
            published_at_ms: item.published_at.timestamp_millis(),
            ingested_at_ms: item.ingested_at.timestamp_millis(),
            is_read: item.is_read,
            is_favorite: item.is_favorite,
        }
    }
}

/// Listing response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsListResponse {
    pub ok: bool,
    /// Most recently ingested first.
    pub items: Vec<NewsItemView>,
    pub message: String,
}

impl NewsListResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            items: Vec::new(),
            message: message.into(),
        }
    }
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsActionResponse {
    pub ok: bool,
    pub message: String,
}

impl NewsActionResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Single-item lookup envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItemResponse {
    pub ok: bool,
    pub item: Option<NewsItemView>,
    pub message: String,
}

/// Completion of one ingestion cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsCycleResponse {
    /// `false` when the cycle failed or no engine is running.
    pub ok: bool,
    pub inserted_count: u32,
    /// `manual|timer|startup`, empty when no cycle finished.
    pub trigger: String,
    pub message: String,
}

/// Configured feed source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsSourceView {
    pub name: String,
    pub endpoint: String,
}

/// Opens the news database and starts the engine.
///
/// # FFI contract
/// - `config_json`: optional JSON engine configuration; `None` uses defaults.
/// - Repeating the call with the same `db_path` is a no-op success.
/// - A different `db_path` after a successful init is rejected.
#[flutter_rust_bridge::frb(sync)]
pub fn news_init(db_path: String, config_json: Option<String>) -> NewsActionResponse {
    let db_path = PathBuf::from(db_path.trim());
    if db_path.as_os_str().is_empty() {
        return NewsActionResponse::failure("news_init failed: db_path cannot be empty");
    }

    let host = match ENGINE_HOST.get_or_try_init(|| start_host(db_path.clone(), config_json)) {
        Ok(host) => host,
        Err(message) => {
            warn!("event=news_init module=ffi status=error error={}", message);
            return NewsActionResponse::failure(format!("news_init failed: {message}"));
        }
    };

    if host.db_path != db_path {
        return NewsActionResponse::failure(format!(
            "news_init failed: engine already running on `{}`",
            host.db_path.display()
        ));
    }
    NewsActionResponse::success("News engine ready.")
}

/// Requests a refresh cycle.
///
/// Returns `false` when a cycle is already running or the engine is not
/// initialized.
#[flutter_rust_bridge::frb(sync)]
pub fn news_trigger_cycle() -> bool {
    ENGINE_HOST
        .get()
        .is_some_and(|host| host.engine.trigger_cycle())
}

/// Lists stored items.
///
/// # FFI contract
/// - `date_from`/`date_to`: inclusive `YYYY-MM-DD` publication days.
/// - `limit = Some(0)` behaves like no limit.
#[allow(clippy::too_many_arguments)]
#[flutter_rust_bridge::frb(sync)]
pub fn news_list_items(
    source: Option<String>,
    text_query: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    favorite_only: bool,
    limit: Option<u32>,
    offset: Option<u32>,
) -> NewsListResponse {
    let Some(host) = ENGINE_HOST.get() else {
        return NewsListResponse::failure("news_list_items failed: engine not initialized");
    };

    let filter = match build_filter(
        source,
        text_query,
        date_from,
        date_to,
        favorite_only,
        limit,
        offset,
    ) {
        Ok(filter) => filter,
        Err(message) => {
            return NewsListResponse::failure(format!("news_list_items failed: {message}"))
        }
    };

    match host.engine.list_items(&filter) {
        Ok(items) => {
            let items: Vec<NewsItemView> = items.into_iter().map(NewsItemView::from).collect();
            let message = if items.is_empty() {
                "No items.".to_string()
            } else {
                format!("Found {} item(s).", items.len())
            };
            NewsListResponse {
                ok: true,
                items,
                message,
            }
        }
        Err(err) => NewsListResponse::failure(format!("news_list_items failed: {err}")),
    }
}

/// Loads one item for the detail view.
#[flutter_rust_bridge::frb(sync)]
pub fn news_get_item(id: i64) -> NewsItemResponse {
    let Some(host) = ENGINE_HOST.get() else {
        return NewsItemResponse {
            ok: false,
            item: None,
            message: "news_get_item failed: engine not initialized".to_string(),
        };
    };
    match host.engine.get_item(id) {
        Ok(item) => NewsItemResponse {
            ok: true,
            item: Some(NewsItemView::from(item)),
            message: "Item loaded.".to_string(),
        },
        Err(err) => NewsItemResponse {
            ok: false,
            item: None,
            message: format!("news_get_item failed: {err}"),
        },
    }
}

/// Marks one item read or unread.
#[flutter_rust_bridge::frb(sync)]
pub fn news_set_read(id: i64, value: bool) -> NewsActionResponse {
    with_engine("news_set_read", |engine| {
        engine.set_read(id, value).map_err(|err| err.to_string())
    })
}

/// Marks one item favorite; favorites are never trimmed.
#[flutter_rust_bridge::frb(sync)]
pub fn news_set_favorite(id: i64, value: bool) -> NewsActionResponse {
    with_engine("news_set_favorite", |engine| {
        engine.set_favorite(id, value).map_err(|err| err.to_string())
    })
}

/// Configured sources in registry order; empty before `news_init`.
#[flutter_rust_bridge::frb(sync)]
pub fn news_sources() -> Vec<NewsSourceView> {
    ENGINE_HOST
        .get()
        .map(|host| {
            host.engine
                .sources()
                .iter()
                .map(|source| NewsSourceView {
                    name: source.name().to_string(),
                    endpoint: source.endpoint().to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Waits for the next undelivered cycle completion.
///
/// Completions are queued from `news_init` on, so a cycle that finished
/// before this call is still reported. Each completion is delivered once.
pub async fn news_next_cycle_complete() -> NewsCycleResponse {
    let Some(host) = ENGINE_HOST.get() else {
        return NewsCycleResponse {
            ok: false,
            inserted_count: 0,
            trigger: String::new(),
            message: "news_next_cycle_complete failed: engine not initialized".to_string(),
        };
    };

    let mut notices = host.notices.lock().await;
    loop {
        match notices.recv().await {
            Ok(notice) => return cycle_response(&notice),
            Err(RecvError::Lagged(skipped)) => {
                warn!(
                    "event=cycle_notice module=ffi status=lagged skipped={}",
                    skipped
                );
            }
            Err(RecvError::Closed) => {
                return NewsCycleResponse {
                    ok: false,
                    inserted_count: 0,
                    trigger: String::new(),
                    message: "news_next_cycle_complete failed: engine stopped".to_string(),
                };
            }
        }
    }
}

fn start_host(db_path: PathBuf, config_json: Option<String>) -> Result<EngineHost, String> {
    let config = match config_json.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => {
            EngineConfig::from_json_str(raw).map_err(|err| err.to_string())?
        }
        _ => EngineConfig::default(),
    };
    let store = NewsStore::open(&db_path).map_err(|err| err.to_string())?;
    let runtime = Builder::new_multi_thread()
        .worker_threads(RUNTIME_WORKER_THREADS)
        .thread_name("newsfeed-worker")
        .enable_all()
        .build()
        .map_err(|err| format!("cannot start runtime: {err}"))?;
    let engine = NewsEngine::start_with_http(config, store, runtime.handle().clone())
        .map_err(|err| err.to_string())?;
    let notices = Mutex::new(engine.subscribe());

    info!(
        "event=news_init module=ffi status=ok db_path={} sources={}",
        db_path.display(),
        engine.sources().len()
    );
    Ok(EngineHost {
        db_path,
        notices,
        engine,
        _runtime: runtime,
    })
}

fn with_engine(
    operation: &str,
    f: impl FnOnce(&NewsEngine) -> Result<(), String>,
) -> NewsActionResponse {
    let Some(host) = ENGINE_HOST.get() else {
        return NewsActionResponse::failure(format!("{operation} failed: engine not initialized"));
    };
    match f(&host.engine) {
        Ok(()) => NewsActionResponse::success("Updated."),
        Err(message) => NewsActionResponse::failure(format!("{operation} failed: {message}")),
    }
}

fn build_filter(
    source: Option<String>,
    text_query: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    favorite_only: bool,
    limit: Option<u32>,
    offset: Option<u32>,
) -> Result<NewsFilter, String> {
    Ok(NewsFilter {
        source,
        text_query,
        date_from: parse_day(date_from.as_deref())?,
        date_to: parse_day(date_to.as_deref())?,
        favorite_only,
        limit: limit.filter(|value| *value > 0),
        offset: offset.unwrap_or(0),
    })
}

fn parse_day(raw: Option<&str>) -> Result<Option<NaiveDate>, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, DATE_FORMAT)
            .map(Some)
            .map_err(|_| format!("invalid date `{value}`; expected YYYY-MM-DD")),
    }
}

fn cycle_response(notice: &CycleNotice) -> NewsCycleResponse {
    let inserted_count = u32::try_from(notice.inserted_count()).unwrap_or(u32::MAX);
    let trigger = notice.trigger().as_str().to_string();
    match notice {
        CycleNotice::Completed { .. } => NewsCycleResponse {
            ok: true,
            inserted_count,
            trigger,
            message: format!("{inserted_count} new item(s)."),
        },
        CycleNotice::Failed { error, .. } => NewsCycleResponse {
            ok: false,
            inserted_count,
            trigger,
            message: format!("cycle failed: {error}"),
        },
    }
}
