//! URL handling module
//!
//! This module provides URL normalization, host extraction and the same-site
//! check the frontier uses to stay on the harvested site.

mod domain;
mod normalize;

pub use domain::{extract_domain, is_same_site};
pub use normalize::normalize_url;

/// File extensions that never lead to an HTML page
const ASSET_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "svg", "ico", "bmp", "avif", "css", "js", "mjs", "json",
    "xml", "pdf", "zip", "gz", "tar", "rar", "7z", "mp3", "mp4", "webm", "avi", "mov", "woff",
    "woff2", "ttf", "eot", "txt", "csv",
];

/// Returns true if the URL path ends in an extension of a non-HTML asset
///
/// # Examples
///
/// ```
/// use product_harvester::url::{is_asset_url, normalize_url};
///
/// assert!(is_asset_url(&normalize_url("https://example.com/logo.PNG").unwrap()));
/// assert!(!is_asset_url(&normalize_url("https://example.com/p/widget").unwrap()));
/// ```
pub fn is_asset_url(url: &::url::Url) -> bool {
    let last_segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    match last_segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            ASSET_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}
