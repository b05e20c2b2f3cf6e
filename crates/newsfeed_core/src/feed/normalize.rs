//! Raw entry normalization.
//!
//! # Invariants
//! - An entry without a title or a link is dropped alone; siblings survive.
//! - Output keeps document order.
//! - Entries without timestamps take the cycle time, so they sort together.

use crate::feed::document::{FeedDocument, RawEntry};
use crate::model::news_item::CandidateItem;
use chrono::{DateTime, Utc};
use log::debug;
use quick_xml::escape::{resolve_html5_entity, unescape_with};
use std::borrow::Cow;

// Longest HTML5 entity name is 31 characters plus `&` and `;`.
const MAX_ENTITY_LEN: usize = 33;

/// Normalized candidates for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedBatch {
    pub items: Vec<CandidateItem>,
    /// Entries dropped for a missing title or link.
    pub dropped: usize,
}

/// Converts a parsed document into storage candidates.
pub fn normalize(
    document: &FeedDocument,
    source_name: &str,
    cycle_time: DateTime<Utc>,
) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    for (index, entry) in document.entries.iter().enumerate() {
        match normalize_entry(entry, source_name, cycle_time) {
            Some(item) => batch.items.push(item),
            None => {
                batch.dropped += 1;
                debug!(
                    "event=entry_dropped module=feed status=skipped source={:?} index={} reason=missing_title_or_link",
                    source_name, index
                );
            }
        }
    }

    batch
}

fn normalize_entry(
    entry: &RawEntry,
    source_name: &str,
    cycle_time: DateTime<Utc>,
) -> Option<CandidateItem> {
    let title = non_empty(entry.title.as_deref())?;
    let link = non_empty(entry.link.as_deref())?;

    let summary = non_empty(entry.summary.as_deref())
        .or_else(|| non_empty(entry.content.as_deref()))
        .map(|raw| unescape_html(raw).trim().to_string())
        .filter(|value| !value.is_empty());

    let published_at = entry
        .published
        .or(entry.updated)
        .map(|value| value.with_timezone(&Utc))
        .unwrap_or(cycle_time);

    Some(CandidateItem {
        source: source_name.to_string(),
        title: title.to_string(),
        link: link.to_string(),
        summary,
        published_at,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Decodes HTML character references, leaving unknown or malformed ones as
/// literal text.
pub fn unescape_html(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    if let Ok(decoded) = unescape_with(raw, resolve_html5_entity) {
        return decoded;
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .char_indices()
            .take(MAX_ENTITY_LEN)
            .find(|(_, ch)| *ch == ';')
            .and_then(|(end, _)| {
                unescape_with(&tail[..=end], resolve_html5_entity)
                    .ok()
                    .map(|value| (end, value))
            });

        match decoded {
            Some((end, value)) => {
                out.push_str(&value);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);

    Cow::Owned(out)
}
