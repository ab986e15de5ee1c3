//! Turn extracted articles into an [`AssembledDocument`].
//!
//! Every downloaded article becomes one chapter named after its position
//! among the downloaded articles (`chapter_<idx>.xhtml`), so failed articles
//! leave no gaps in the numbering. Images referenced by the article HTML are matched
//! against the images downloaded for that article and embedded under
//! `images/`; tags without a downloaded counterpart are left as they are.
//!
//! # Image file names
//!
//! `image_<idx>_<n><ext>`, where `idx` is the chapter index and `n` the number
//! of images already embedded in the whole document. The extension comes from
//! the image URL's path and defaults to `.jpg`.

use crate::config::SiteRules;
use crate::models::{AssembledDocument, Chapter, ExtractedArticle};
use crate::scrapers::dom::{self, IMAGE};
use crate::utils::title_case;
use chrono::{DateTime, Local, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use scraper::node::Comment;
use scraper::{ElementRef, Node};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info, instrument};
use url::Url;

const IDENTIFIER_PREFIX: &str = "golem";
const SLOT_PREFIX: &str = "golem-image-slot-";
const DEFAULT_IMAGE_EXT: &str = ".jpg";

/// Document title, optionally decorated with a topic.
pub fn document_title(publisher: &str, topic: Option<&str>) -> String {
    match topic.filter(|t| !t.trim().is_empty()) {
        Some(topic) => format!("{publisher} - {} Articles", title_case(topic)),
        None => format!("{publisher} Articles"),
    }
}

/// Extension of the URL path including the dot, `.jpg` when there is none.
fn image_extension(source_url: &str) -> String {
    Url::parse(source_url)
        .ok()
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .and_then(|e| e.to_str())
                .filter(|e| !e.is_empty())
                .map(|e| format!(".{e}"))
        })
        .unwrap_or_else(|| DEFAULT_IMAGE_EXT.to_string())
}

/// `<img>` tag pointing at an embedded file, keeping every other attribute.
///
/// A tag without `alt` gets the alt text recorded when the image was
/// downloaded.
fn rewritten_img_tag(img: ElementRef<'_>, relative_path: &str, alt_text: &str) -> String {
    let mut tag = format!(r#"<img src="{}""#, encode_double_quoted_attribute(relative_path));
    for (name, value) in img.value().attrs() {
        if name == "src" || name == "data-src" {
            continue;
        }
        tag.push_str(&format!(r#" {name}="{}""#, encode_double_quoted_attribute(value)));
    }
    if img.value().attr("alt").is_none() && !alt_text.is_empty() {
        tag.push_str(&format!(r#" alt="{}""#, encode_double_quoted_attribute(alt_text)));
    }
    tag.push_str("/>");
    tag
}

fn attribution(canonical_url: &str) -> String {
    format!(
        r#"<div class="source" style="margin-top: 3em; padding-top: 1em; border-top: 1px solid #ddd; font-size: 0.85em; color: #666;"><p><strong>Quelle:</strong> <a href="{}">{}</a></p></div>"#,
        encode_double_quoted_attribute(canonical_url),
        encode_text(canonical_url)
    )
}

/// Build the chapter for the article at 1-based position `idx`.
///
/// `embedded` is the number of images already placed in the document and is
/// advanced for every image this chapter embeds.
pub fn render_chapter(article: &ExtractedArticle, idx: usize, embedded: &mut usize) -> Chapter {
    let mut doc = dom::fragment(&article.combined_html());
    let base = Url::parse(&article.canonical_url).ok();

    let mut image_files = BTreeMap::new();
    let mut by_url: HashMap<String, String> = HashMap::new();
    let mut slots = Vec::new();

    for img in doc.select(&IMAGE) {
        let Some(absolute) = dom::image_source(img).and_then(|src| match &base {
            Some(base) => base.join(src).ok().map(|u| u.to_string()),
            None => Url::parse(src).ok().map(|u| u.to_string()),
        }) else {
            continue;
        };
        let Some(image) = article.image(&absolute) else {
            debug!(url = %absolute, "No downloaded image for tag; leaving it unchanged");
            continue;
        };

        let relative_path = by_url
            .entry(absolute)
            .or_insert_with(|| {
                let path = format!(
                    "images/image_{idx}_{}{}",
                    *embedded,
                    image_extension(&image.source_url)
                );
                *embedded += 1;
                image_files.insert(path.clone(), image.bytes.clone());
                path
            })
            .clone();
        slots.push((img.id(), rewritten_img_tag(img, &relative_path, &image.alt_text)));
    }

    for (n, (id, _)) in slots.iter().enumerate() {
        if let Some(mut node) = doc.tree.get_mut(*id) {
            *node.value() = Node::Comment(Comment {
                comment: format!("{SLOT_PREFIX}{n}").as_str().into(),
            });
        }
    }

    let mut html_body = dom::fragment_html(&doc);
    for (n, (_, tag)) in slots.iter().enumerate() {
        html_body = html_body.replacen(&format!("<!--{SLOT_PREFIX}{n}-->"), tag, 1);
    }
    html_body.push_str(&attribution(&article.canonical_url));

    Chapter {
        title: article.title.clone(),
        file_name: format!("chapter_{idx}.xhtml"),
        html_body,
        image_files,
    }
}

/// Assemble articles into a document; `None` entries are skipped and do not
/// take a chapter number.
#[instrument(level = "info", skip(articles, rules, now), fields(articles = articles.len()))]
pub fn assemble(
    articles: &[Option<ExtractedArticle>],
    topic: Option<&str>,
    rules: &SiteRules,
    now: DateTime<Local>,
) -> AssembledDocument {
    let mut embedded = 0usize;
    let chapters: Vec<Chapter> = articles
        .iter()
        .flatten()
        .enumerate()
        .map(|(i, article)| {
            let idx = i + 1;
            debug!(idx, title = %article.title, "Adding chapter");
            render_chapter(article, idx, &mut embedded)
        })
        .collect();

    let document = AssembledDocument {
        identifier: format!("{IDENTIFIER_PREFIX}-{}", now.format("%Y%m%d-%H%M%S")),
        title: document_title(&rules.publisher, topic),
        language: rules.language.clone(),
        author: rules.publisher.clone(),
        created: now.with_timezone(&Utc),
        chapters,
    };
    info!(
        chapters = document.chapters.len(),
        images = document.image_count(),
        title = %document.title,
        "Assembled document"
    );
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExtractedImage;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    const URL: &str = "https://www.golem.de/news/sycl-2510-201445.html";

    fn article(fragments: &[&str], images: &[(&str, &str)]) -> ExtractedArticle {
        ExtractedArticle {
            title: "SYCL".to_string(),
            canonical_url: URL.to_string(),
            author: None,
            published: None,
            page_count: fragments.len(),
            content_fragments: fragments.iter().map(|f| f.to_string()).collect(),
            images: images
                .iter()
                .map(|(url, bytes)| ExtractedImage {
                    source_url: url.to_string(),
                    bytes: bytes.as_bytes().to_vec(),
                    alt_text: String::new(),
                })
                .collect(),
        }
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 10, 29, 10, 36, 1).unwrap()
    }

    #[test]
    fn test_document_title() {
        assert_eq!(document_title("Golem.de", None), "Golem.de Articles");
        assert_eq!(
            document_title("Golem.de", Some("plus archive")),
            "Golem.de - Plus Archive Articles"
        );
        assert_eq!(
            document_title("Golem.de", Some("softwareentwicklung")),
            "Golem.de - Softwareentwicklung Articles"
        );
    }

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("https://www.golem.de/img/a.png"), ".png");
        assert_eq!(image_extension("https://www.golem.de/img/a.webp?w=800"), ".webp");
        assert_eq!(image_extension("https://www.golem.de/img/a"), ".jpg");
        assert_eq!(image_extension("https://www.golem.de/img/"), ".jpg");
    }

    #[test]
    fn test_render_chapter_rewrites_matched_images() {
        let a = article(
            &[r#"<p><img src="/img/a.png" alt="Diagramm"><img data-src="https://cdn.example/b"></p>"#],
            &[
                ("https://www.golem.de/img/a.png", "A"),
                ("https://cdn.example/b", "B"),
            ],
        );
        let mut embedded = 3;
        let chapter = render_chapter(&a, 2, &mut embedded);

        assert_eq!(chapter.file_name, "chapter_2.xhtml");
        assert_eq!(embedded, 5);
        assert_eq!(
            chapter.image_files.keys().collect::<Vec<_>>(),
            vec!["images/image_2_3.png", "images/image_2_4.jpg"]
        );
        assert!(chapter.html_body.starts_with(
            r#"<p><img src="images/image_2_3.png" alt="Diagramm"/><img src="images/image_2_4.jpg"/></p>"#
        ));
        assert!(!chapter.html_body.contains("data-src"));
    }

    #[test]
    fn test_render_chapter_leaves_unmatched_images() {
        let tag = r#"<img data-src="/img/lazy.jpg" src="/img/placeholder.gif" alt="Platzhalter" width="640">"#;
        let a = article(
            &[&format!("<p>{tag}</p>")],
            &[("https://www.golem.de/img/lazy.jpg", "L")],
        );
        let mut embedded = 0;
        let chapter = render_chapter(&a, 1, &mut embedded);

        assert_eq!(embedded, 0);
        assert!(chapter.image_files.is_empty());
        assert!(chapter.html_body.starts_with(&format!("<p>{tag}</p><div")));
    }

    #[test]
    fn test_render_chapter_keeps_attribute_order() {
        let a = article(
            &[r#"<p><img class="wide" src="/img/a.png" title="Grafik" data-src="/img/a.png"></p>"#],
            &[("https://www.golem.de/img/a.png", "A")],
        );
        let chapter = render_chapter(&a, 1, &mut 0);
        assert!(chapter.html_body.starts_with(
            r#"<p><img src="images/image_1_0.png" class="wide" title="Grafik"/></p>"#
        ));
    }

    #[test]
    fn test_render_chapter_reuses_file_for_repeated_url() {
        let a = article(
            &["<p><img src=\"/img/a.png\"></p>", "<p><img src=\"https://www.golem.de/img/a.png\"></p>"],
            &[("https://www.golem.de/img/a.png", "A")],
        );
        let mut embedded = 0;
        let chapter = render_chapter(&a, 1, &mut embedded);

        assert_eq!(embedded, 1);
        assert_eq!(chapter.image_files.len(), 1);
        assert_eq!(chapter.html_body.matches("images/image_1_0.png").count(), 2);
        assert!(chapter.html_body.contains("<em>Page 2</em>"));
    }

    #[test]
    fn test_render_chapter_appends_attribution() {
        let a = article(&["<p>Text</p>"], &[]);
        let chapter = render_chapter(&a, 1, &mut 0);
        assert!(chapter.html_body.starts_with("<p>Text</p>"));
        assert!(chapter.html_body.ends_with(&format!(
            r#"<p><strong>Quelle:</strong> <a href="{URL}">{URL}</a></p></div>"#
        )));
    }

    #[test]
    fn test_assemble_numbers_downloaded_articles_without_gaps() {
        let first = article(
            &["<img src=\"/img/1.png\">"],
            &[("https://www.golem.de/img/1.png", "1")],
        );
        let third = article(
            &["<img src=\"/img/3.gif\">"],
            &[("https://www.golem.de/img/3.gif", "3")],
        );
        let doc = assemble(
            &[Some(first), None, Some(third)],
            Some("security"),
            &SiteRules::default(),
            now(),
        );

        assert_eq!(doc.identifier, "golem-20251029-103601");
        assert_eq!(doc.title, "Golem.de - Security Articles");
        assert_eq!(doc.language, "de");
        assert_eq!(doc.author, "Golem.de");
        assert_eq!(
            doc.chapters.iter().map(|c| c.file_name.as_str()).collect::<Vec<_>>(),
            vec!["chapter_1.xhtml", "chapter_2.xhtml"]
        );
        assert!(doc.chapters[0].image_files.contains_key("images/image_1_0.png"));
        assert!(doc.chapters[1].image_files.contains_key("images/image_2_1.gif"));
        assert_eq!(doc.image_count(), 2);
    }

    #[test]
    fn test_assemble_empty_input() {
        let doc = assemble(&[None, None], None, &SiteRules::default(), now());
        assert!(doc.chapters.is_empty());
        assert_eq!(doc.title, "Golem.de Articles");
    }
}
