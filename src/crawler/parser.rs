//! HTML parser for extracting links and metadata
//!
//! This module handles parsing HTML content to extract:
//! - Links to follow (from <a> tags and canonical links)
//! - Page title
//! - Sitemap `<loc>` entries
//! - Signs that a page is assembled client-side

use crate::harvest::normalize_title;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

/// Visible body text below which a scripted page counts as client-rendered
const MIN_VISIBLE_TEXT: usize = 200;

/// Ids and attributes single-page-app frameworks mount into
const MOUNT_SELECTORS: &[&str] = &["#root", "#app", "#__next", "#__nuxt", "[data-reactroot]"];

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The normalised page title (from <title> tag)
    pub title: Option<String>,

    /// All links found on the page (absolute URLs)
    pub links: Vec<String>,
}

/// Parses HTML content and extracts links and metadata
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
/// - Anything that does not resolve to http(s)
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The base URL for resolving relative links
///
/// # Example
///
/// ```
/// use product_harvester::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, base_url),
    }
}

/// Extracts just the normalised title from an HTML document or prefix
pub fn page_title(html: &str) -> Option<String> {
    extract_title(&Html::parse_document(html))
}

/// Extracts `<loc>` entries from a sitemap or sitemap index
pub fn extract_sitemap_locs(xml: &str) -> Vec<String> {
    let document = Html::parse_document(xml);
    let Ok(selector) = Selector::parse("loc") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|loc| !loc.is_empty())
        .collect()
}

/// Guesses whether a page builds its content with JavaScript
///
/// A page counts as client-rendered when it ships scripts and either has an
/// empty framework mount node or almost no visible body text.
pub fn detect_javascript_rendering(html: &str) -> bool {
    let document = Html::parse_document(html);

    let scripts = Selector::parse("script")
        .map(|selector| document.select(&selector).count())
        .unwrap_or(0);
    if scripts == 0 {
        return false;
    }

    let empty_mount = MOUNT_SELECTORS.iter().any(|raw| {
        Selector::parse(raw)
            .map(|selector| document.select(&selector).any(|mount| visible_text_len(mount) == 0))
            .unwrap_or(false)
    });
    if empty_mount {
        return true;
    }

    let body_text = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .map(visible_text_len)
        .unwrap_or(0);

    body_text < MIN_VISIBLE_TEXT
}

/// Counts non-whitespace text outside script-like elements
fn visible_text_len(element: ElementRef<'_>) -> usize {
    element
        .descendants()
        .filter_map(|node| match node.value() {
            Node::Text(text) => {
                let hidden = node.ancestors().any(|ancestor| {
                    ancestor.value().as_element().map_or(false, |e| {
                        matches!(e.name(), "script" | "style" | "noscript" | "template")
                    })
                });
                (!hidden).then(|| text.trim().len())
            }
            _ => None,
        })
        .sum()
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| normalize_title(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

/// Collects `<a href>` targets (minus `download` links) and canonical links
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href], link[rel='canonical'][href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|element| element.value().attr("download").is_none())
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, base_url))
        .collect()
}

/// Resolves `href` against `base_url`, keeping only http(s) targets
///
/// Script, mail, phone and data links and same-page anchors yield `None`.
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    const SKIPPED_PREFIXES: &[&str] = &["javascript:", "mailto:", "tel:", "data:", "#"];

    let href = href.trim();
    if href.is_empty() || SKIPPED_PREFIXES.iter().any(|prefix| href.starts_with(prefix)) {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    matches!(absolute.scheme(), "http" | "https").then(|| absolute.to_string())
}
