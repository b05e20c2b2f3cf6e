//! Fetch-retrier for one feed source.
//!
//! # Responsibility
//! - Define the transport seam (`FeedFetcher`) and its HTTP implementation.
//! - Retry transport and parse failures a bounded number of times.
//!
//! # Invariants
//! - Network errors, timeouts and parse failures are retried identically.
//! - The delay is applied between attempts, never after the last one.
//! - A source that exhausts its attempts yields `Skipped`, never an error
//!   that could abort the cycle.

use crate::feed::document::{FeedDocument, FeedParseError};
use crate::source::FeedSource;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Transport-level fetch failure for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    Timeout(String),
    Transport(String),
    Status(u16),
    /// HTTP client could not be constructed.
    Client(String),
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout(message) => write!(f, "request timed out: {message}"),
            Self::Transport(message) => write!(f, "request failed: {message}"),
            Self::Status(status) => write!(f, "unexpected HTTP status {status}"),
            Self::Client(message) => write!(f, "failed to build HTTP client: {message}"),
        }
    }
}

impl Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout(value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}

/// Transport seam used by the retrier.
///
/// Implementations return the raw document body; parsing stays in the
/// retrier so parse failures count as failed attempts.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, source: &FeedSource) -> Result<Vec<u8>, FetchError>;
}

/// `reqwest`-backed fetcher with a per-attempt timeout.
#[derive(Debug, Clone)]
pub struct HttpFeedFetcher {
    client: Client,
}

impl HttpFeedFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|err| FetchError::Client(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, source: &FeedSource) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(source.endpoint().clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        Ok(body.to_vec())
    }
}

/// Bounded retry settings for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// A source that produced no usable document this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub attempts: u32,
    pub last_error: String,
}

/// Per-source result of one cycle.
pub type SourceOutcome = Result<FeedDocument, Skipped>;

#[derive(Debug)]
enum AttemptError {
    Fetch(FetchError),
    Parse(FeedParseError),
}

impl Display for AttemptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch(err) => write!(f, "{err}"),
            Self::Parse(err) => write!(f, "{err}"),
        }
    }
}

impl AttemptError {
    fn code(&self) -> &'static str {
        match self {
            Self::Fetch(FetchError::Timeout(_)) => "fetch_timeout",
            Self::Fetch(FetchError::Status(_)) => "fetch_status",
            Self::Fetch(_) => "fetch_failed",
            Self::Parse(_) => "parse_failed",
        }
    }
}

/// Fetches and parses one source, retrying per `policy`.
pub async fn fetch_source(
    fetcher: &dyn FeedFetcher,
    source: &FeedSource,
    policy: &RetryPolicy,
) -> SourceOutcome {
    let attempts = policy.attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match attempt_once(fetcher, source).await {
            Ok(document) => {
                debug!(
                    "event=feed_fetch module=feed status=ok source={:?} attempt={} entries={}",
                    source.name(),
                    attempt,
                    document.len()
                );
                return Ok(document);
            }
            Err(err) => {
                warn!(
                    "event=feed_fetch module=feed status=error source={:?} attempt={}/{} error_code={} error={}",
                    source.name(),
                    attempt,
                    attempts,
                    err.code(),
                    err
                );
                last_error = err.to_string();
            }
        }

        if attempt < attempts && !policy.delay.is_zero() {
            tokio::time::sleep(policy.delay).await;
        }
    }

    warn!(
        "event=feed_fetch module=feed status=skipped source={:?} attempts={}",
        source.name(),
        attempts
    );
    Err(Skipped {
        attempts,
        last_error,
    })
}

async fn attempt_once(
    fetcher: &dyn FeedFetcher,
    source: &FeedSource,
) -> Result<FeedDocument, AttemptError> {
    let body = fetcher.fetch(source).await.map_err(AttemptError::Fetch)?;
    FeedDocument::parse(&body).map_err(AttemptError::Parse)
}

#[cfg(test)]
mod tests {
    use super::{fetch_source, FeedFetcher, FetchError, RetryPolicy};
    use crate::config::SourceConfig;
    use crate::source::{FeedSource, SourceRegistry};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const VALID_FEED: &str = r#"<rss version="2.0"><channel><title>t</title>
<item><title>A</title><link>https://e.com/a</link></item>
</channel></rss>"#;

    struct ScriptedFetcher {
        responses: Mutex<VecDeque<Result<Vec<u8>, FetchError>>>,
        calls: AtomicU32,
    }

    impl ScriptedFetcher {
        fn new(responses: Vec<Result<Vec<u8>, FetchError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl FeedFetcher for ScriptedFetcher {
        async fn fetch(&self, _source: &FeedSource) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Transport("script exhausted".to_string())))
        }
    }

    fn source() -> FeedSource {
        let registry =
            SourceRegistry::from_sources(&[SourceConfig::new("Test", "https://e.com/feed")])
                .unwrap();
        let first = registry.iter().next().unwrap().clone();
        first
    }

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            delay: Duration::from_secs(2),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_usable_document() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(FetchError::Timeout("slow".to_string())),
            Ok(VALID_FEED.as_bytes().to_vec()),
        ]);

        let document = fetch_source(&fetcher, &source(), &policy(3)).await.unwrap();
        assert_eq!(document.len(), 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn parse_failures_are_retried_like_transport_failures() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(b"<html>maintenance</html>".to_vec()),
            Err(FetchError::Status(503)),
            Ok(VALID_FEED.as_bytes().to_vec()),
        ]);

        let document = fetch_source(&fetcher, &source(), &policy(3)).await.unwrap();
        assert_eq!(document.entries[0].title.as_deref(), Some("A"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempts_skip_the_source() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(FetchError::Transport("refused".to_string())),
            Err(FetchError::Transport("refused".to_string())),
            Err(FetchError::Status(500)),
            Ok(VALID_FEED.as_bytes().to_vec()),
        ]);

        let started = tokio::time::Instant::now();
        let skipped = fetch_source(&fetcher, &source(), &policy(3))
            .await
            .unwrap_err();

        assert_eq!(skipped.attempts, 3);
        assert!(skipped.last_error.contains("500"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
        // Two waits between three attempts.
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_tries_once() {
        let fetcher = ScriptedFetcher::new(vec![Ok(VALID_FEED.as_bytes().to_vec())]);
        assert!(fetch_source(&fetcher, &source(), &policy(0)).await.is_ok());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }
}
