//! Data models flowing through the pipeline.
//!
//! - [`FeedEntry`]: a candidate article produced by the feed resolver
//! - [`ExtractedArticle`] / [`ExtractedImage`]: one downloaded article with
//!   all of its pages and images
//! - [`AssembledDocument`] / [`Chapter`]: the packaged result, ready to be
//!   serialized as an EPUB

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder used wherever a title is missing.
pub const UNTITLED: &str = "Untitled";

/// A candidate article as listed by a feed or the archive.
///
/// The URL is the natural key; a resolution pass never yields two entries
/// with the same URL.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FeedEntry {
    pub title: String,
    pub url: String,
    /// ISO-8601 publication timestamp when the source provides one.
    pub published: Option<String>,
    pub summary: Option<String>,
}

impl FeedEntry {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            published: None,
            summary: None,
        }
    }
}

/// Image bytes downloaded for an article.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedImage {
    /// Absolute URL, resolved against the page the image was found on.
    pub source_url: String,
    pub bytes: Vec<u8>,
    pub alt_text: String,
}

/// A fully downloaded article.
///
/// `content_fragments` holds one cleaned HTML fragment per page, so its
/// length always equals `page_count`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedArticle {
    pub title: String,
    pub canonical_url: String,
    pub author: Option<String>,
    pub published: Option<String>,
    pub page_count: usize,
    pub content_fragments: Vec<String>,
    pub images: Vec<ExtractedImage>,
}

impl ExtractedArticle {
    /// Marker inserted before page `page_number` (1-based) in the combined HTML.
    pub fn page_separator(page_number: usize) -> String {
        format!("<hr/><p><em>Page {page_number}</em></p>")
    }

    /// All pages concatenated, with a separator before every page after the first.
    pub fn combined_html(&self) -> String {
        let mut html = String::new();
        for (idx, fragment) in self.content_fragments.iter().enumerate() {
            if idx > 0 {
                html.push_str(&Self::page_separator(idx + 1));
            }
            html.push_str(fragment);
        }
        html
    }

    /// Content of the first page only.
    pub fn first_page(&self) -> Option<&str> {
        self.content_fragments.first().map(String::as_str)
    }

    pub fn image(&self, source_url: &str) -> Option<&ExtractedImage> {
        self.images.iter().find(|i| i.source_url == source_url)
    }
}

/// One article rendered as an EPUB chapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub title: String,
    /// File name inside the package, e.g. `chapter_3.xhtml`.
    pub file_name: String,
    pub html_body: String,
    /// Image bytes keyed by relative path (`images/...`).
    pub image_files: BTreeMap<String, Vec<u8>>,
}

/// The packaged reading document.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledDocument {
    pub identifier: String,
    pub title: String,
    pub language: String,
    pub author: String,
    /// Assembly time, recorded as the package's modification date.
    pub created: DateTime<Utc>,
    pub chapters: Vec<Chapter>,
}

impl AssembledDocument {
    pub fn image_count(&self) -> usize {
        self.chapters.iter().map(|c| c.image_files.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn article(fragments: &[&str]) -> ExtractedArticle {
        ExtractedArticle {
            title: "Test".to_string(),
            canonical_url: "https://www.golem.de/news/test-2510-1.html".to_string(),
            author: None,
            published: None,
            page_count: fragments.len(),
            content_fragments: fragments.iter().map(|f| f.to_string()).collect(),
            images: vec![],
        }
    }

    #[test]
    fn test_combined_html_single_page_has_no_separator() {
        let a = article(&["<article>one</article>"]);
        assert_eq!(a.combined_html(), "<article>one</article>");
    }

    #[test]
    fn test_combined_html_separators() {
        let a = article(&["<p>1</p>", "<p>2</p>", "<p>3</p>"]);
        assert_eq!(
            a.combined_html(),
            "<p>1</p><hr/><p><em>Page 2</em></p><p>2</p><hr/><p><em>Page 3</em></p><p>3</p>"
        );
        assert_eq!(a.combined_html().matches("<hr/>").count(), a.page_count - 1);
    }

    #[test]
    fn test_first_page() {
        let a = article(&["<p>1</p>", "<p>2</p>"]);
        assert_eq!(a.first_page(), Some("<p>1</p>"));
    }

    #[test]
    fn test_feed_entry_serialization() {
        let entry = FeedEntry::new("Titel", "https://www.golem.de/news/a.html");
        let json = serde_json::to_string(&entry).unwrap();
        let back: FeedEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
