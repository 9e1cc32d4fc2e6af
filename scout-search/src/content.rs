//! Visible-text extraction from HTML.
//!
//! Keeps everything a visitor can read, including navigation and footers
//! (brand lists often live there), and drops scripts, styles and other
//! non-rendered elements. The `<title>` and meta description are included.

use crate::error::{Result, SearchError};
use crate::types::PageContent;
use scraper::{ElementRef, Html, Node, Selector};

/// Default maximum characters kept from a page.
pub const DEFAULT_MAX_CHARS: usize = 200_000;

/// Elements whose text is never rendered.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// Extract readable text from raw HTML.
///
/// # Errors
///
/// Returns [`SearchError::Parse`] if the page has no readable text.
pub fn extract_content(html: &str, url: &str) -> Result<PageContent> {
    extract_content_with_limit(html, url, DEFAULT_MAX_CHARS)
}

/// Same as [`extract_content`] with an explicit character cap.
///
/// # Errors
///
/// Returns [`SearchError::Parse`] if the page has no readable text.
pub fn extract_content_with_limit(html: &str, url: &str, max_chars: usize) -> Result<PageContent> {
    let document = Html::parse_document(html);
    let title = first_text(&document, "title");
    let description = document
        .select(&selector("meta[name=description]")?)
        .next()
        .and_then(|m| m.value().attr("content"))
        .unwrap_or_default()
        .trim()
        .to_owned();

    let mut parts = vec![title.clone(), description];
    collect_visible(document.root_element(), &mut parts);

    let text = collapse_whitespace(&parts.join(" "));
    if text.is_empty() {
        return Err(SearchError::Parse("no extractable content found".into()));
    }
    let text: String = text.chars().take(max_chars).collect();
    let word_count = text.split_whitespace().count();

    Ok(PageContent {
        url: url.to_owned(),
        title,
        text,
        word_count,
    })
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| SearchError::Parse(format!("invalid selector {css}: {e:?}")))
}

fn first_text(document: &Html, css: &str) -> String {
    let Ok(sel) = Selector::parse(css) else {
        return String::new();
    };
    document
        .select(&sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_owned())
        .unwrap_or_default()
}

fn collect_visible(element: ElementRef<'_>, out: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_owned());
                }
            }
            Node::Element(el) if HIDDEN_ELEMENTS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_visible(child_el, out);
                }
            }
            _ => {}
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
