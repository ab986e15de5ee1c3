//! Golem.de article scraper.
//!
//! Articles may span several pages. Starting from the article URL, every page
//! is fetched, its content region is isolated and cleaned, and its images are
//! downloaded. The next-page control is looked up on the raw page *before*
//! cleaning, because cleaning removes the navigation that carries it.
//!
//! # Failure handling
//!
//! | Where | What happens |
//! |-------|--------------|
//! | Page 1 fetch fails / no content | the article fails |
//! | Later page fetch fails / no content | pagination stops, earlier pages are kept |
//! | Image fetch fails | the image is skipped; a later tag with the same URL tries again |

use super::dom::{self, IMAGE, NAV, text_of};
use crate::config::{CompiledRules, Timing};
use crate::error::{Result, ScrapeError};
use crate::models::{ExtractedArticle, ExtractedImage, UNTITLED};
use crate::session::Fetcher;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Article metadata, read from the first page only.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleMeta {
    pub title: String,
    pub author: Option<String>,
    pub published: Option<String>,
}

/// What one raw page yields before any cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct PageScan {
    pub meta: ArticleMeta,
    /// Outer HTML of the content region, if one was found.
    pub content: Option<String>,
    /// Absolute URL of the next page.
    pub next_link: Option<String>,
}

/// A cleaned content region plus the images it references.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedPage {
    pub html: String,
    /// `(absolute source URL, alt text)` in document order.
    pub images: Vec<(String, String)>,
}

fn trimmed(text: String) -> Option<String> {
    let t = text.trim();
    (!t.is_empty()).then(|| t.to_string())
}

fn read_meta(document: &Html, rules: &CompiledRules) -> ArticleMeta {
    let title = document
        .select(&rules.title)
        .next()
        .and_then(|h| trimmed(text_of(h)))
        .unwrap_or_else(|| UNTITLED.to_string());

    let author = dom::first_with_class(document.root_element(), &rules.author_class)
        .and_then(|el| trimmed(text_of(el)));

    let published = document
        .select(&rules.time)
        .next()
        .or_else(|| dom::first_with_class(document.root_element(), &rules.date_class))
        .and_then(|el| {
            dom::attr(el, "datetime")
                .map(|d| d.trim().to_string())
                .or_else(|| trimmed(text_of(el)))
        });

    ArticleMeta {
        title,
        author,
        published,
    }
}

fn find_content<'a>(document: &'a Html, rules: &CompiledRules) -> Option<ElementRef<'a>> {
    document
        .select(&rules.content)
        .next()
        .or_else(|| {
            document
                .select(&rules.content_class_tag)
                .find(|el| dom::has_class_matching(*el, &rules.content_class))
        })
        .or_else(|| {
            rules
                .content_fallbacks
                .iter()
                .find_map(|sel| document.select(sel).next())
        })
}

fn find_next_link(document: &Html, page_url: &Url, rules: &CompiledRules) -> Option<String> {
    let control = rules
        .next_page
        .iter()
        .find_map(|sel| document.select(sel).next())?;
    let link = if control.value().name() == "a" {
        control
    } else {
        control.select(&dom::ANCHOR).next()?
    };
    let href = dom::attr(link, "href")?;
    page_url.join(href).ok().map(|u| u.to_string())
}

/// Read metadata, the content region and the next-page link from a raw page.
pub fn scan_page(html: &str, page_url: &Url, rules: &CompiledRules) -> PageScan {
    let document = Html::parse_document(html);
    PageScan {
        meta: read_meta(&document, rules),
        content: find_content(&document, rules).map(|el| el.html()),
        next_link: find_next_link(&document, page_url, rules),
    }
}

/// Strip non-content elements from a content region and list its images.
pub fn clean_content(content_html: &str, page_url: &Url, rules: &CompiledRules) -> CleanedPage {
    let mut doc = dom::fragment(content_html);

    let unwanted = dom::remove_elements(&mut doc, |el| {
        dom::has_class_matching(el, &rules.unwanted_class)
    });
    let navs = dom::remove_elements(&mut doc, |el| NAV.matches(&el));
    let trailing = dom::truncate_after(&mut doc, &rules.article_end);
    let relabeled = dom::strip_link_phrase(&mut doc, &rules.site.new_window_phrase);
    debug!(unwanted, navs, trailing, relabeled, "Cleaned content region");

    let images = doc
        .select(&IMAGE)
        .filter_map(|img| {
            let src = dom::image_source(img)?;
            let absolute = page_url.join(src).ok()?;
            let alt = img.value().attr("alt").unwrap_or_default().to_string();
            Some((absolute.to_string(), alt))
        })
        .collect();

    CleanedPage {
        html: dom::fragment_html(&doc),
        images,
    }
}

async fn fetch_image<F: Fetcher>(fetcher: &F, url: &str, timing: &Timing) -> Option<Vec<u8>> {
    let result = fetcher
        .get(url, timing.image_timeout)
        .await
        .and_then(|r| r.error_for_status(url));
    match result {
        Ok(response) => {
            let content_type = response
                .headers
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            debug!(%url, bytes = response.body.len(), content_type, "Downloaded image");
            Some(response.body)
        }
        Err(e) => {
            warn!(%url, error = %e, "Image download failed; skipping");
            None
        }
    }
}

/// Download an article with all of its pages and images.
#[instrument(level = "info", skip(fetcher, rules, timing))]
pub async fn extract<F: Fetcher>(
    fetcher: &F,
    url: &str,
    rules: &CompiledRules,
    timing: &Timing,
) -> Result<ExtractedArticle> {
    let mut meta: Option<ArticleMeta> = None;
    let mut fragments: Vec<String> = Vec::new();
    let mut images: Vec<ExtractedImage> = Vec::new();
    let mut collected_images: HashSet<String> = HashSet::new();
    let mut visited_urls: HashSet<String> = HashSet::new();
    let mut current = url.to_string();

    loop {
        let page_num = fragments.len() + 1;
        let page_url = Url::parse(&current)?;
        visited_urls.insert(current.clone());
        if page_num > 1 {
            info!(page = page_num, url = %current, "Downloading follow-up page");
        }

        let response = match fetcher
            .get(&current, timing.page_timeout)
            .await
            .and_then(|r| r.error_for_status(&current))
        {
            Ok(r) => r,
            Err(e) if page_num == 1 => return Err(e),
            Err(e) => {
                warn!(page = page_num, error = %e, "Follow-up page failed; keeping earlier pages");
                break;
            }
        };

        let scan = scan_page(&response.text(), &page_url, rules);
        if meta.is_none() {
            meta = Some(scan.meta.clone());
        }

        let Some(content) = scan.content else {
            if page_num == 1 {
                return Err(ScrapeError::MissingContent(current));
            }
            warn!(page = page_num, url = %current, "No content region on follow-up page; keeping earlier pages");
            break;
        };

        let cleaned = clean_content(&content, &page_url, rules);
        fragments.push(cleaned.html);

        for (source_url, alt_text) in cleaned.images {
            if collected_images.contains(&source_url) {
                continue;
            }
            if let Some(bytes) = fetch_image(fetcher, &source_url, timing).await {
                collected_images.insert(source_url.clone());
                images.push(ExtractedImage {
                    source_url,
                    bytes,
                    alt_text,
                });
            }
        }

        match scan.next_link {
            Some(next) if !visited_urls.contains(&next) => {
                debug!(next = %next, "Found next page");
                current = next;
                sleep(timing.page_delay).await;
            }
            _ => break,
        }
    }

    let meta = meta.unwrap_or_else(|| ArticleMeta {
        title: UNTITLED.to_string(),
        author: None,
        published: None,
    });
    info!(
        pages = fragments.len(),
        images = images.len(),
        title = %meta.title,
        "Extracted article"
    );

    Ok(ExtractedArticle {
        title: meta.title,
        canonical_url: url.to_string(),
        author: meta.author,
        published: meta.published,
        page_count: fragments.len(),
        content_fragments: fragments,
        images,
    })
}
