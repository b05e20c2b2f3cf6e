#![allow(dead_code)]

use async_trait::async_trait;
use newsfeed_core::{EngineConfig, FeedFetcher, FeedSource, FetchError, SourceConfig};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::watch;

/// One scripted fetch result.
#[derive(Debug, Clone)]
pub enum Reply {
    Feed(String),
    Fail(FetchError),
    Panic,
}

/// In-process fetcher replaying scripted replies per source name.
///
/// The last reply of a script repeats once the earlier ones are used up.
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<HashMap<String, u32>>,
    gate: watch::Sender<bool>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            gate,
        }
    }

    pub fn script(&self, source: &str, replies: Vec<Reply>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(source.to_string(), replies.into());
    }

    pub fn always(&self, source: &str, reply: Reply) {
        self.script(source, vec![reply]);
    }

    pub fn calls(&self, source: &str) -> u32 {
        self.calls.lock().unwrap().get(source).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    /// Holds every fetch until `open_gate` is called.
    pub fn close_gate(&self) {
        self.gate.send_replace(false);
    }

    pub fn open_gate(&self) {
        self.gate.send_replace(true);
    }

    fn next_reply(&self, source: &str) -> Reply {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(source) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Reply::Fail(FetchError::Transport("empty script".into()))),
            None => Reply::Fail(FetchError::Transport(format!("no script for {source}"))),
        }
    }
}

#[async_trait]
impl FeedFetcher for ScriptedFetcher {
    async fn fetch(&self, source: &FeedSource) -> Result<Vec<u8>, FetchError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(source.name().to_string())
            .or_insert(0) += 1;

        let mut gate = self.gate.subscribe();
        gate.wait_for(|open| *open).await.unwrap();

        match self.next_reply(source.name()) {
            Reply::Feed(body) => Ok(body.into_bytes()),
            Reply::Fail(err) => Err(err),
            Reply::Panic => panic!("scripted fetcher panic for {}", source.name()),
        }
    }
}

/// RSS 2.0 document with `(title, link)` items in order.
pub fn rss(items: &[(&str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(title, link)| format!("<item><title>{title}</title><link>{link}</link></item>"))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>scripted</title><link>https://scripted.example</link>
<description>scripted</description>{body}</channel></rss>"#
    )
}

/// RSS document with `count` well-formed items titled `<prefix> <n>`.
pub fn rss_numbered(prefix: &str, count: usize) -> String {
    let titles: Vec<String> = (0..count).map(|n| format!("{prefix} {n}")).collect();
    let links: Vec<String> = (0..count)
        .map(|n| format!("https://{prefix}.example/{n}"))
        .collect();
    let items: Vec<(&str, &str)> = titles
        .iter()
        .zip(&links)
        .map(|(title, link)| (title.as_str(), link.as_str()))
        .collect();
    rss(&items)
}

/// Engine configuration for scripted sources with no retry delay.
pub fn config(sources: &[&str]) -> EngineConfig {
    EngineConfig {
        sources: sources
            .iter()
            .map(|name| SourceConfig::new(*name, format!("https://{name}.example/rss")))
            .collect(),
        refresh_interval_secs: 3_600,
        retry_delay_ms: 0,
        ..EngineConfig::default()
    }
}
