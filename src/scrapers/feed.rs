//! Feed resolution: RSS/Atom, OPML-style outlines and the Plus archive.
//!
//! [`resolve`] is the single entry point. It returns candidate articles in
//! source order, deduplicated by exact URL and truncated to the requested
//! maximum.
//!
//! # Format detection
//!
//! A feed URL is treated as an outline document when the URL mentions `opml`
//! or the body starts with an `<opml` element; everything else goes through
//! `feed-rs`. Broken feed bodies and error statuses are logged and yield
//! whatever entries the body holds, usually none, instead of failing the run.
//! Only a transport failure on the feed request is an error.

use super::archive;
use crate::config::{CompiledRules, Timing};
use crate::error::Result;
use crate::models::{FeedEntry, UNTITLED};
use crate::session::Fetcher;
use itertools::Itertools;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, info, instrument, warn};

/// Where candidate articles come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    /// An RSS/Atom or outline feed URL.
    Feed(String),
    /// The paginated Plus archive listing.
    Archive,
}

/// Resolve a source into at most `max_articles` unique entries.
#[instrument(level = "info", skip(fetcher, rules, timing))]
pub async fn resolve<F: Fetcher>(
    fetcher: &F,
    source: &FeedSource,
    max_articles: Option<usize>,
    rules: &CompiledRules,
    timing: &Timing,
) -> Result<Vec<FeedEntry>> {
    let entries = match source {
        FeedSource::Feed(url) => fetch_feed(fetcher, url, timing).await?,
        FeedSource::Archive => archive::index_articles(fetcher, rules, timing, max_articles).await,
    };

    let mut entries = dedupe_by_url(entries);
    if let Some(max) = max_articles {
        entries.truncate(max);
    }
    info!(count = entries.len(), "Resolved feed entries");
    Ok(entries)
}

/// Keep the first entry for every URL, preserving order.
pub fn dedupe_by_url(entries: Vec<FeedEntry>) -> Vec<FeedEntry> {
    let before = entries.len();
    let unique: Vec<FeedEntry> = entries
        .into_iter()
        .unique_by(|e| e.url.clone())
        .collect();
    if unique.len() < before {
        debug!(dropped = before - unique.len(), "Dropped duplicate feed entries");
    }
    unique
}

/// Fetch a feed URL and parse it as RSS/Atom or outline format.
#[instrument(level = "info", skip(fetcher, timing))]
pub async fn fetch_feed<F: Fetcher>(
    fetcher: &F,
    url: &str,
    timing: &Timing,
) -> Result<Vec<FeedEntry>> {
    let response = fetcher.get(url, timing.page_timeout).await?;
    if !response.is_success() {
        warn!(status = response.status, "Feed answered with an error status; parsing the body anyway");
    }
    let body = response.text();

    let entries = if is_outline(url, &body) {
        parse_outline(&body)
    } else {
        parse_rss(body.as_bytes())
    };
    info!(count = entries.len(), "Parsed feed");
    Ok(entries)
}

fn is_outline(url: &str, body: &str) -> bool {
    let head: String = body.chars().take(200).collect();
    url.to_lowercase().contains("opml") || head.to_lowercase().contains("<opml")
}

/// Parse RSS/Atom; malformed input yields an empty list.
pub fn parse_rss(bytes: &[u8]) -> Vec<FeedEntry> {
    let feed = match feed_rs::parser::parse(bytes) {
        Ok(feed) => feed,
        Err(e) => {
            warn!(error = %e, "Feed body could not be parsed; no entries");
            return Vec::new();
        }
    };

    feed.entries
        .into_iter()
        .map(|entry| FeedEntry {
            title: entry
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| UNTITLED.to_string()),
            url: entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default(),
            published: entry.published.or(entry.updated).map(|dt| dt.to_rfc3339()),
            summary: entry.summary.map(|s| s.content),
        })
        .collect()
}

/// Parse an outline document where every `outline` element is one article.
///
/// Parsing stops at the first XML error, keeping what was read so far.
pub fn parse_outline(xml: &str) -> Vec<FeedEntry> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut seen = 0usize;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"outline" => {
                seen += 1;
                if let Some(entry) = outline_entry(&e, &reader) {
                    entries.push(entry);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(
                    error = %e,
                    position = reader.buffer_position(),
                    "Outline document is malformed; keeping entries parsed so far"
                );
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    info!(outlines = seen, entries = entries.len(), "Parsed outline document");
    entries
}

fn outline_entry(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Option<FeedEntry> {
    let mut html_url = None;
    let mut url = None;
    let mut title = None;
    let mut text = None;
    let mut description = None;

    for attr in e.attributes() {
        let attr = match attr {
            Ok(attr) => attr,
            Err(e) => {
                warn!(error = %e, "Skipping malformed outline attribute");
                continue;
            }
        };
        let value = match attr.decode_and_unescape_value(reader.decoder()) {
            Ok(v) => v.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "Skipping undecodable outline attribute");
                continue;
            }
        };
        if value.is_empty() {
            continue;
        }
        match attr.key.as_ref() {
            b"htmlUrl" => html_url = Some(value),
            b"url" => url = Some(value),
            b"title" => title = Some(value),
            b"text" => text = Some(value),
            b"description" => description = Some(value),
            _ => {}
        }
    }

    let url = html_url.or(url)?;
    Some(FeedEntry {
        title: title.or(text).unwrap_or_else(|| UNTITLED.to_string()),
        url,
        published: None,
        summary: description,
    })
}
