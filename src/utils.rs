//! Utility functions for date presentation, naming, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - German date formatting for article listings
//! - Topic title casing and default EPUB file names
//! - String truncation for logging
//! - File system validation for the download directory

use crate::error::Result;
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use std::fs as stdfs;
use tokio::fs;
use tracing::{debug, info, instrument};

/// Month names indexed by `month - 1`.
pub type MonthNames = [&'static str; 12];

pub const GERMAN_MONTHS: MonthNames = [
    "Januar",
    "Februar",
    "März",
    "April",
    "Mai",
    "Juni",
    "Juli",
    "August",
    "September",
    "Oktober",
    "November",
    "Dezember",
];

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if value.contains('T') {
        // Wall-clock time as written; the offset is not applied.
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.naive_local())
            .ok()
            .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok())
            .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M").ok())
    } else {
        let day = value.split_whitespace().next()?;
        NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }
}

/// Render an ISO timestamp for human readers.
///
/// `2025-10-29T10:36:01.000Z` becomes `29. Oktober 2025, 10:36 Uhr`; the time
/// is dropped when it is exactly midnight, and a plain `2025-10-29` becomes
/// `29. Oktober 2025`. Input that cannot be parsed is returned unchanged.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_german_date("2025-10-29", &GERMAN_MONTHS), "29. Oktober 2025");
/// assert_eq!(format_german_date("gestern", &GERMAN_MONTHS), "gestern");
/// ```
pub fn format_german_date(value: &str, months: &MonthNames) -> String {
    if value.is_empty() {
        return String::new();
    }
    let Some(dt) = parse_timestamp(value) else {
        debug!(%value, "Could not parse date; showing it verbatim");
        return value.to_string();
    };

    let month = months[dt.month0() as usize];
    if dt.hour() == 0 && dt.minute() == 0 {
        format!("{}. {} {}", dt.day(), month, dt.year())
    } else {
        format!(
            "{}. {} {}, {:02}:{:02} Uhr",
            dt.day(),
            month,
            dt.year(),
            dt.hour(),
            dt.minute()
        )
    }
}

/// Capitalize the first letter of every word and lowercase the rest.
///
/// A "word" is a run of alphabetic characters, so `plus-archive` becomes
/// `Plus-Archive`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

/// Default EPUB file name for a run started at `now`.
///
/// - archive mode: `golem_plus_archive_<YYYYmmdd_HHMMSS>.epub`
/// - topic feed: `golem_<topic>_<YYYYmmdd_HHMMSS>.epub`
/// - no topic: `golem_<YYYYmmdd_HHMMSS>.epub`
pub fn default_output_filename(topic: Option<&str>, archive: bool, now: DateTime<Local>) -> String {
    let timestamp = now.format("%Y%m%d_%H%M%S");
    if archive {
        return format!("golem_plus_archive_{timestamp}.epub");
    }
    match topic.filter(|t| !t.is_empty()) {
        Some(topic) => format!("golem_{topic}_{timestamp}.epub"),
        None => format!("golem_{timestamp}.epub"),
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and the number of
/// dropped characters appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("Überwachung", 4), "Über…(+7 chars)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let total = s.chars().count();
    if total <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{head}…(+{} chars)", total - max)
    }
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns [`crate::error::ScrapeError::Io`] if the directory cannot be
/// created or is not writable (permission denied, read-only filesystem, etc.).
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<()> {
    fs::create_dir_all(path).await?;
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Download directory is writable");
    Ok(())
}
