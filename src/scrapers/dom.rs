//! Small helpers over `scraper`'s DOM used by the article and archive scrapers.
//!
//! Class-pattern lookups follow the usual "any class token matches the
//! regex" rule, so `author|byline` matches `class="go-article__byline big"`.
//! Mutating helpers operate on a fragment document whose single top-level
//! element is the region being cleaned.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::node::Text;
use scraper::{ElementRef, Html, Node, Selector};

pub static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
pub static IMAGE: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
pub static NAV: Lazy<Selector> = Lazy::new(|| Selector::parse("nav").unwrap());

/// Concatenated text of an element and its descendants.
pub fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

pub fn has_class_matching(el: ElementRef<'_>, pattern: &Regex) -> bool {
    el.value().classes().any(|class| pattern.is_match(class))
}

/// First element below `root` (in document order) with a matching class.
pub fn first_with_class<'a>(root: ElementRef<'a>, pattern: &Regex) -> Option<ElementRef<'a>> {
    root.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|el| has_class_matching(*el, pattern))
}

/// Non-empty attribute value.
pub fn attr<'a>(el: ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value().attr(name).filter(|v| !v.trim().is_empty())
}

/// `src`, falling back to the lazy-load `data-src`.
pub fn image_source<'a>(el: ElementRef<'a>) -> Option<&'a str> {
    attr(el, "src").or_else(|| attr(el, "data-src"))
}

/// Parse `html` as a fragment so it can be cleaned in isolation.
pub fn fragment(html: &str) -> Html {
    Html::parse_fragment(html)
}

/// Serialized content of a fragment built with [`fragment`].
pub fn fragment_html(doc: &Html) -> String {
    doc.root_element().inner_html()
}

/// The element being cleaned: the first element of a [`fragment`].
pub fn region(doc: &Html) -> Option<ElementRef<'_>> {
    doc.root_element().children().find_map(ElementRef::wrap)
}

/// Elements strictly below the region (the region itself excluded).
fn region_descendants(doc: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    region(doc)
        .into_iter()
        .flat_map(|r| r.descendants().skip(1).filter_map(ElementRef::wrap))
}

/// Detach every element below the region for which `pred` holds.
pub fn remove_elements(doc: &mut Html, pred: impl Fn(ElementRef<'_>) -> bool) -> usize {
    let ids: Vec<_> = region_descendants(doc)
        .filter(|el| pred(*el))
        .map(|el| el.id())
        .collect();
    for id in &ids {
        if let Some(mut node) = doc.tree.get_mut(*id) {
            node.detach();
        }
    }
    ids.len()
}

/// Detach every element following the first `marker` below the region.
///
/// The marker itself stays. Returns the number of removed siblings.
pub fn truncate_after(doc: &mut Html, marker: &Selector) -> usize {
    let Some(end) = region_descendants(doc).find(|el| marker.matches(el)) else {
        return 0;
    };
    let ids: Vec<_> = end
        .next_siblings()
        .filter(|node| node.value().is_element())
        .map(|node| node.id())
        .collect();
    for id in &ids {
        if let Some(mut node) = doc.tree.get_mut(*id) {
            node.detach();
        }
    }
    ids.len()
}

/// Replace the children of every anchor whose text contains `phrase` with a
/// single text node holding the text minus the phrase, trimmed.
pub fn strip_link_phrase(doc: &mut Html, phrase: &str) -> usize {
    if phrase.is_empty() {
        return 0;
    }
    let edits: Vec<_> = doc
        .select(&ANCHOR)
        .filter_map(|link| {
            let text = text_of(link);
            text.contains(phrase)
                .then(|| (link.id(), text.replace(phrase, "").trim().to_string()))
        })
        .collect();
    for (id, new_text) in &edits {
        if let Some(mut link) = doc.tree.get_mut(*id) {
            while let Some(mut child) = link.first_child() {
                child.detach();
            }
            link.append(Node::Text(Text {
                text: new_text.as_str().into(),
            }));
        }
    }
    edits.len()
}
