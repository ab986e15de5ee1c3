//! Golem Plus archive scraper.
//!
//! The Plus archive has no feed, so candidate articles are collected from the
//! paginated listing at `https://www.golem.de/specials/golemplus/`.
//!
//! # Pagination
//!
//! Each listing page links to its successor through the pagination `nav`
//! region; the link labelled `Nächste Seite` is followed until it disappears,
//! points back to a page already visited, or enough articles were found.
//! A failed page request ends the crawl but keeps the entries collected so far.

use super::dom::text_of;
use crate::config::{CompiledRules, Timing};
use crate::models::{FeedEntry, UNTITLED};
use crate::session::Fetcher;
use scraper::Html;
use std::collections::HashSet;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Article links and the next-page URL found on one listing page.
#[derive(Debug, Default, PartialEq)]
pub struct ListingPage {
    pub entries: Vec<FeedEntry>,
    pub next_page: Option<String>,
}

/// Parse one listing page fetched from `page_url`.
pub fn parse_listing(html: &str, page_url: &Url, rules: &CompiledRules) -> ListingPage {
    let document = Html::parse_document(html);

    let entries = document
        .select(&rules.archive_link)
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            if !rules.archive_href.is_match(href) {
                return None;
            }
            let url = page_url.join(href).ok()?;
            let title = text_of(link).trim().to_string();
            Some(FeedEntry::new(
                if title.is_empty() { UNTITLED.to_string() } else { title },
                url.to_string(),
            ))
        })
        .collect();

    let next_page = document
        .select(&rules.pagination_nav)
        .next()
        .and_then(|nav| {
            nav.select(&rules.pagination_link)
                .find(|link| text_of(*link).contains(&rules.site.next_page_label))
        })
        .and_then(|link| link.value().attr("href"))
        .and_then(|href| page_url.join(href).ok())
        .map(|url| url.to_string());

    ListingPage { entries, next_page }
}

/// Walk the archive listing and collect unique article entries.
///
/// Stops once `max_articles` entries are collected; a failed page fetch
/// stops the crawl and returns the partial list.
#[instrument(level = "info", skip(fetcher, rules, timing))]
pub async fn index_articles<F: Fetcher>(
    fetcher: &F,
    rules: &CompiledRules,
    timing: &Timing,
    max_articles: Option<usize>,
) -> Vec<FeedEntry> {
    let mut entries = Vec::new();
    let mut seen_urls = HashSet::new();
    let mut visited_pages = HashSet::new();
    let mut current = rules.site.archive_url.clone();
    let mut page_num = 1usize;

    loop {
        visited_pages.insert(current.clone());
        debug!(page = page_num, url = %current, "Requesting archive page");

        let response = match fetcher.get(&current, timing.page_timeout).await {
            Ok(r) if r.is_success() => r,
            Ok(r) => {
                warn!(
                    page = page_num,
                    status = r.status,
                    collected = entries.len(),
                    "Archive page request failed; session may have expired. Keeping partial list"
                );
                break;
            }
            Err(e) => {
                warn!(page = page_num, error = %e, collected = entries.len(), "Archive page request failed; keeping partial list");
                break;
            }
        };

        let page_url = match Url::parse(&response.url) {
            Ok(url) => url,
            Err(e) => {
                warn!(url = %response.url, error = %e, "Archive page has an unusable URL");
                break;
            }
        };
        let listing = parse_listing(&response.text(), &page_url, rules);

        let mut new_on_page = 0usize;
        for entry in listing.entries {
            if seen_urls.insert(entry.url.clone()) {
                entries.push(entry);
                new_on_page += 1;
            }
        }
        info!(page = page_num, found = new_on_page, "Indexed archive page");

        if max_articles.is_some_and(|max| entries.len() >= max) {
            debug!("Reached article ceiling, stopping pagination");
            break;
        }

        match listing.next_page {
            Some(next) if next != current && !visited_pages.contains(&next) => {
                current = next;
                page_num += 1;
                sleep(timing.page_delay).await;
            }
            _ => {
                debug!("No further archive page");
                break;
            }
        }
    }

    info!(total = entries.len(), pages = page_num, "Finished archive crawl");
    entries
}
