//! Format-neutral feed document.
//!
//! RSS 2.0 is tried first, then Atom. Both parsers are all-or-nothing: a
//! document either yields its full entry list or a parse error.

use chrono::{DateTime, FixedOffset};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One entry as found in the feed, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    /// RSS `description` or Atom `summary`.
    pub summary: Option<String>,
    /// RSS `content:encoded` or Atom `content`.
    pub content: Option<String>,
    pub published: Option<DateTime<FixedOffset>>,
    pub updated: Option<DateTime<FixedOffset>>,
}

/// Parsed feed with entries in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedDocument {
    pub entries: Vec<RawEntry>,
}

/// Neither the RSS nor the Atom parser accepted the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedParseError {
    pub rss: String,
    pub atom: String,
}

impl Display for FeedParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "payload is neither RSS ({}) nor Atom ({})",
            self.rss, self.atom
        )
    }
}

impl Error for FeedParseError {}

impl FeedDocument {
    /// Parses a fetched payload.
    pub fn parse(bytes: &[u8]) -> Result<Self, FeedParseError> {
        let rss_error = match rss::Channel::read_from(bytes) {
            Ok(channel) => return Ok(Self::from_rss(&channel)),
            Err(err) => err.to_string(),
        };

        match atom_syndication::Feed::read_from(bytes) {
            Ok(feed) => Ok(Self::from_atom(&feed)),
            Err(err) => Err(FeedParseError {
                rss: rss_error,
                atom: err.to_string(),
            }),
        }
    }

    pub fn from_rss(channel: &rss::Channel) -> Self {
        let entries = channel
            .items()
            .iter()
            .map(|item| RawEntry {
                title: item.title().map(String::from),
                link: item.link().map(String::from),
                summary: item.description().map(String::from),
                content: item.content().map(String::from),
                published: item.pub_date().and_then(parse_feed_date),
                updated: item
                    .dublin_core_ext()
                    .and_then(|dc| dc.dates().first())
                    .and_then(|raw| parse_feed_date(raw)),
            })
            .collect();

        Self { entries }
    }

    pub fn from_atom(feed: &atom_syndication::Feed) -> Self {
        let entries = feed
            .entries()
            .iter()
            .map(|entry| {
                let link = entry
                    .links()
                    .iter()
                    .find(|link| link.rel() == "alternate")
                    .or_else(|| entry.links().first())
                    .map(|link| link.href().to_string());

                // The parser leaves `updated` at the Unix epoch when absent.
                let updated = Some(*entry.updated()).filter(|value| value.timestamp() != 0);

                RawEntry {
                    title: Some(entry.title().value.clone()),
                    link,
                    summary: entry.summary().map(|text| text.value.clone()),
                    content: entry
                        .content()
                        .and_then(|content| content.value())
                        .map(String::from),
                    published: entry.published().copied(),
                    updated,
                }
            })
            .collect();

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// RFC 2822 is the RSS norm; many feeds emit RFC 3339 instead.
fn parse_feed_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    DateTime::parse_from_rfc2822(trimmed)
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::FeedDocument;
    use chrono::{TimeZone, Utc};

    #[test]
    fn parses_rss_items_in_order() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Test Feed</title>
    <item>
      <title>First Post</title>
      <link>https://example.com/1</link>
      <pubDate>Mon, 01 Jan 2024 00:00:00 +0000</pubDate>
      <description>First description</description>
      <content:encoded><![CDATA[<p>Full body</p>]]></content:encoded>
    </item>
    <item>
      <title>Second Post</title>
      <link>https://example.com/2</link>
    </item>
  </channel>
</rss>"#;

        let document = FeedDocument::parse(xml.as_bytes()).unwrap();
        assert_eq!(document.len(), 2);

        let first = &document.entries[0];
        assert_eq!(first.title.as_deref(), Some("First Post"));
        assert_eq!(first.link.as_deref(), Some("https://example.com/1"));
        assert_eq!(first.summary.as_deref(), Some("First description"));
        assert_eq!(first.content.as_deref(), Some("<p>Full body</p>"));
        assert_eq!(
            first.published.map(|value| value.with_timezone(&Utc)),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );

        let second = &document.entries[1];
        assert_eq!(second.title.as_deref(), Some("Second Post"));
        assert!(second.published.is_none());
    }

    #[test]
    fn accepts_rfc3339_pub_date() {
        let xml = r#"<rss version="2.0"><channel><title>t</title>
<item><title>A</title><link>https://e.com/a</link><pubDate>2024-03-05T10:00:00+01:00</pubDate></item>
</channel></rss>"#;

        let document = FeedDocument::parse(xml.as_bytes()).unwrap();
        assert_eq!(
            document.entries[0]
                .published
                .map(|value| value.with_timezone(&Utc)),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn invalid_dates_become_absent() {
        let xml = r#"<rss version="2.0"><channel><title>t</title>
<item><title>A</title><link>https://e.com/a</link><pubDate>not-a-real-date</pubDate></item>
</channel></rss>"#;

        let document = FeedDocument::parse(xml.as_bytes()).unwrap();
        assert!(document.entries[0].published.is_none());
    }

    #[test]
    fn parses_atom_entries_preferring_alternate_link() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Feed</title>
  <id>urn:feed</id>
  <updated>2024-02-01T00:00:00Z</updated>
  <entry>
    <title>Atom Entry</title>
    <id>urn:entry:1</id>
    <link rel="self" href="https://example.com/self"/>
    <link rel="alternate" href="https://example.com/atom-1"/>
    <updated>2024-02-01T12:00:00Z</updated>
    <summary>Short &amp; sweet</summary>
  </entry>
</feed>"#;

        let document = FeedDocument::parse(xml.as_bytes()).unwrap();
        assert_eq!(document.len(), 1);
        let entry = &document.entries[0];
        assert_eq!(entry.title.as_deref(), Some("Atom Entry"));
        assert_eq!(entry.link.as_deref(), Some("https://example.com/atom-1"));
        assert_eq!(entry.summary.as_deref(), Some("Short & sweet"));
        assert!(entry.published.is_none());
        assert_eq!(
            entry.updated.map(|value| value.with_timezone(&Utc)),
            Some(Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn empty_channel_is_a_usable_document() {
        let xml = r#"<rss version="2.0"><channel><title>quiet</title></channel></rss>"#;
        let document = FeedDocument::parse(xml.as_bytes()).unwrap();
        assert!(document.is_empty());
    }

    #[test]
    fn garbage_payload_is_a_parse_error() {
        let err = FeedDocument::parse(b"<html><body>503</body></html>").unwrap_err();
        assert!(err.to_string().contains("neither RSS"));
    }
}
