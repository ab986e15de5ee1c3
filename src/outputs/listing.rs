//! Plain-text article listing for `--list-only` runs.

use crate::models::FeedEntry;
use crate::utils::{MonthNames, format_german_date};
use std::fmt::Write;

const RULE_WIDTH: usize = 80;

/// Numbered listing of `entries` with title, URL and formatted date.
pub fn render_listing(entries: &[FeedEntry], months: &MonthNames) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Found {} articles:", entries.len());
    let _ = writeln!(out, "{rule}\n");
    for (idx, entry) in entries.iter().enumerate() {
        let _ = writeln!(out, "[{}] {}", idx + 1, entry.title);
        let _ = writeln!(out, "    URL: {}", entry.url);
        if let Some(published) = entry.published.as_deref().filter(|p| !p.is_empty()) {
            let _ = writeln!(out, "    Date: {}", format_german_date(published, months));
        }
        out.push('\n');
    }
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Total: {} articles", entries.len());
    let _ = write!(out, "{rule}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::GERMAN_MONTHS;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_listing() {
        let mut dated = FeedEntry::new("SYCL", "https://www.golem.de/news/sycl-2510-201445.html");
        dated.published = Some("2025-10-29T10:36:01.000Z".to_string());
        let undated = FeedEntry::new("Untitled", "https://www.golem.de/news/x-2510-1.html");

        let out = render_listing(&[dated, undated], &GERMAN_MONTHS);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[1], "Found 2 articles:");
        assert_eq!(lines[4], "[1] SYCL");
        assert_eq!(lines[5], "    URL: https://www.golem.de/news/sycl-2510-201445.html");
        assert_eq!(lines[6], "    Date: 29. Oktober 2025, 10:36 Uhr");
        assert_eq!(lines[8], "[2] Untitled");
        assert_eq!(lines[9], "    URL: https://www.golem.de/news/x-2510-1.html");
        assert_eq!(lines[10], "");
        assert!(out.contains("Total: 2 articles"));
    }

    #[test]
    fn test_render_empty_listing() {
        let out = render_listing(&[], &GERMAN_MONTHS);
        assert!(out.contains("Found 0 articles:"));
        assert!(out.ends_with(&"=".repeat(80)));
    }
}
