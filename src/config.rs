//! Site vocabulary and timing configuration.
//!
//! Everything that couples the scraper to golem.de markup lives in
//! [`SiteRules`]: CSS selectors, class-name patterns, fixed phrases and entry
//! URLs. The built-in defaults match the live site; a YAML file passed with
//! `--rules` can override any subset of them, so markup changes on the origin
//! site only require editing the table.
//!
//! ```yaml
//! # rules.yaml
//! new_window_phrase: "(öffnet im neuen Fenster)"
//! next_page_selectors:
//!   - .go-pagination__item--next
//!   - .gsnw-link__article-pagination
//! ```

use crate::error::{Result, ScrapeError};
use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument};

/// Site-coupled selector table.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SiteRules {
    /// RSS endpoint; `{topic}` is replaced by the URL-encoded topic.
    pub feed_url_template: String,
    /// First page of the Plus archive listing.
    pub archive_url: String,
    pub archive_link_selector: String,
    /// Regex an archive link's href must match to count as an article.
    pub archive_href_pattern: String,
    pub pagination_nav_selector: String,
    pub pagination_link_selector: String,
    /// Visible text of the archive's "next page" link.
    pub next_page_label: String,

    pub title_selector: String,
    pub author_class_pattern: String,
    pub time_selector: String,
    pub date_class_pattern: String,
    pub content_selector: String,
    pub content_class_tag: String,
    pub content_class_pattern: String,
    pub content_fallback_selectors: Vec<String>,
    /// Tried in order; the first hit is the article's next-page control.
    pub next_page_selectors: Vec<String>,
    pub unwanted_class_pattern: String,
    pub article_end_selector: String,
    pub new_window_phrase: String,

    /// A Plus article used to check that the session can read paywalled text.
    pub probe_article_url: String,
    pub account_url: String,
    /// Cookies are only installed when their domain contains this string.
    pub cookie_domain: String,
    /// Domain assumed for cookie exports that do not carry one.
    pub default_cookie_domain: String,

    pub publisher: String,
    pub language: String,
}

impl Default for SiteRules {
    fn default() -> Self {
        Self {
            feed_url_template: "https://rss.golem.de/rss.php?ms={topic}".to_string(),
            archive_url: "https://www.golem.de/specials/golemplus/".to_string(),
            archive_link_selector: "a.go-teaser__link".to_string(),
            archive_href_pattern: r"/news/.*\.html".to_string(),
            pagination_nav_selector: "nav.go-pagination".to_string(),
            pagination_link_selector: "a.go-pagination__link".to_string(),
            next_page_label: "Nächste Seite".to_string(),

            title_selector: "h1".to_string(),
            author_class_pattern: "author|byline".to_string(),
            time_selector: "time".to_string(),
            date_class_pattern: "date|published".to_string(),
            content_selector: "article".to_string(),
            content_class_tag: "div".to_string(),
            content_class_pattern: "content|article".to_string(),
            content_fallback_selectors: vec!["main".to_string(), "div.main".to_string()],
            next_page_selectors: vec![
                ".go-pagination__item--next".to_string(),
                ".gsnw-link__article-pagination".to_string(),
            ],
            unwanted_class_pattern:
                "go-teaser-block|advertisement|ad-container|go-button-bar|go-alink-list"
                    .to_string(),
            article_end_selector: ".go-article-end".to_string(),
            new_window_phrase: "(öffnet im neuen Fenster)".to_string(),

            probe_article_url: "https://www.golem.de/news/softwareentwicklung-mit-sycl-parallel-programmieren-fuer-fast-jede-plattform-2510-201445.html".to_string(),
            account_url: "https://account.golem.de/user".to_string(),
            cookie_domain: "golem.de".to_string(),
            default_cookie_domain: ".golem.de".to_string(),

            publisher: "Golem.de".to_string(),
            language: "de".to_string(),
        }
    }
}

impl SiteRules {
    /// Parse a (possibly partial) rules table from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a rules table from disk.
    #[instrument(level = "info")]
    pub async fn load(path: &str) -> Result<Self> {
        let yaml = tokio::fs::read_to_string(path).await?;
        let rules = Self::from_yaml(&yaml)?;
        info!(path, "Loaded site rules");
        Ok(rules)
    }

    /// RSS URL for a topic such as `security` or `softwareentwicklung`.
    pub fn feed_url(&self, topic: &str) -> String {
        self.feed_url_template
            .replace("{topic}", &urlencoding::encode(topic))
    }

    /// Compile selectors and patterns once for the whole run.
    pub fn compile(&self) -> Result<CompiledRules> {
        Ok(CompiledRules {
            archive_link: selector(&self.archive_link_selector)?,
            archive_href: Regex::new(&self.archive_href_pattern)?,
            pagination_nav: selector(&self.pagination_nav_selector)?,
            pagination_link: selector(&self.pagination_link_selector)?,
            title: selector(&self.title_selector)?,
            author_class: Regex::new(&self.author_class_pattern)?,
            time: selector(&self.time_selector)?,
            date_class: Regex::new(&self.date_class_pattern)?,
            content: selector(&self.content_selector)?,
            content_class_tag: selector(&self.content_class_tag)?,
            content_class: Regex::new(&self.content_class_pattern)?,
            content_fallbacks: self
                .content_fallback_selectors
                .iter()
                .map(|s| selector(s))
                .collect::<Result<_>>()?,
            next_page: self
                .next_page_selectors
                .iter()
                .map(|s| selector(s))
                .collect::<Result<_>>()?,
            unwanted_class: Regex::new(&self.unwanted_class_pattern)?,
            article_end: selector(&self.article_end_selector)?,
            site: self.clone(),
        })
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScrapeError::Selector(format!("{css}: {e}")))
}

/// [`SiteRules`] with every selector and pattern parsed.
#[derive(Debug)]
pub struct CompiledRules {
    pub archive_link: Selector,
    pub archive_href: Regex,
    pub pagination_nav: Selector,
    pub pagination_link: Selector,
    pub title: Selector,
    pub author_class: Regex,
    pub time: Selector,
    pub date_class: Regex,
    pub content: Selector,
    pub content_class_tag: Selector,
    pub content_class: Regex,
    pub content_fallbacks: Vec<Selector>,
    pub next_page: Vec<Selector>,
    pub unwanted_class: Regex,
    pub article_end: Selector,
    pub site: SiteRules,
}

/// Fixed politeness delays and request timeouts.
///
/// The delays are not adaptive; they only keep the request rate towards the
/// origin server low.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub page_delay: Duration,
    pub article_delay: Duration,
    pub page_timeout: Duration,
    pub image_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_secs(1),
            article_delay: Duration::from_secs(2),
            page_timeout: Duration::from_secs(30),
            image_timeout: Duration::from_secs(15),
        }
    }
}

#[cfg(test)]
impl Timing {
    /// Same timeouts, no delays.
    pub fn without_delays() -> Self {
        Self {
            page_delay: Duration::ZERO,
            article_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}
