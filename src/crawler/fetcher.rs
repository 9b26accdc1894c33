//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests for full HTML pages
//! - Prefix-only GET requests that stop once the page title has arrived
//! - Error classification

use crate::config::UserAgentConfig;
use crate::crawler::parser::page_title;
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client, Response};
use std::time::Duration;

/// Bytes read at most when looking for a page title
pub const TITLE_PREFIX_LIMIT: usize = 64 * 1024;

const MAX_REDIRECTS: usize = 10;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the page
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Content-Type header value
        content_type: String,
        /// Page body content
        body: String,
    },

    /// Page is not HTML (Content-Type mismatch)
    ContentMismatch {
        /// The actual Content-Type received
        content_type: String,
    },

    /// Server answered with a non-success status
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// Network error (connection refused, timeout, etc.)
    NetworkError {
        /// Error description
        error: String,
    },
}

impl FetchResult {
    /// Returns the final URL and body of a successful fetch
    pub fn into_page(self) -> Option<(String, String)> {
        match self {
            Self::Success {
                final_url, body, ..
            } => Some((final_url, body)),
            _ => None,
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Overall timeout for a single request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use product_harvester::config::UserAgentConfig;
/// use product_harvester::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "ProductHarvester".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/bot".to_string(),
///     contact_email: "bot@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches an HTML page
///
/// Non-HTML responses are reported as `ContentMismatch` without reading the
/// body.
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
///
/// # Returns
///
/// A FetchResult indicating success or the type of failure
pub async fn fetch_page(client: &Client, url: &str) -> FetchResult {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => return classify_error(&e),
    };

    let status = response.status();
    if !status.is_success() {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
        };
    }

    let content_type = content_type(&response);
    if !is_html(&content_type) {
        return FetchResult::ContentMismatch { content_type };
    }

    let final_url = response.url().to_string();
    match response.text().await {
        Ok(body) => FetchResult::Success {
            final_url,
            status_code: status.as_u16(),
            content_type,
            body,
        },
        Err(e) => classify_error(&e),
    }
}

/// Fetches just enough of a page to read its title
///
/// The body is streamed until `</title>` has been received or
/// [`TITLE_PREFIX_LIMIT`] bytes were read, whichever comes first; the rest
/// of the response is never downloaded.
///
/// # Returns
///
/// The normalised title, or `None` if the page failed, is not HTML, or has
/// no non-empty title
pub async fn fetch_title(client: &Client, url: &str) -> Option<String> {
    let mut response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("Title fetch failed for {}: {}", url, e);
            return None;
        }
    };

    let status = response.status();
    if !status.is_success() {
        tracing::debug!("Title fetch for {} returned HTTP {}", url, status);
        return None;
    }

    let content_type = content_type(&response);
    if !is_html(&content_type) {
        tracing::trace!("Skipping {} with content type {}", url, content_type);
        return None;
    }

    let mut prefix: Vec<u8> = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                if push_chunk(&mut prefix, &chunk) || prefix.len() >= TITLE_PREFIX_LIMIT {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("Body read failed for {} after {} bytes: {}", url, prefix.len(), e);
                break;
            }
        }
    }

    prefix.truncate(TITLE_PREFIX_LIMIT);
    page_title(&String::from_utf8_lossy(&prefix))
}

const TITLE_END: &[u8] = b"</title>";

/// Appends `chunk` and reports whether `</title>` has now been received
///
/// Only the new bytes, plus the tail a closing tag could straddle, are
/// scanned.
fn push_chunk(prefix: &mut Vec<u8>, chunk: &[u8]) -> bool {
    let scan_from = prefix.len().saturating_sub(TITLE_END.len() - 1);
    prefix.extend_from_slice(chunk);
    has_title_end(&prefix[scan_from..])
}

fn has_title_end(bytes: &[u8]) -> bool {
    bytes
        .windows(TITLE_END.len())
        .any(|window| window.eq_ignore_ascii_case(TITLE_END))
}

fn content_type(response: &Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// Returns true for HTML and XHTML content types
pub fn is_html(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("text/html") || content_type.contains("application/xhtml+xml")
}

fn classify_error(e: &reqwest::Error) -> FetchResult {
    let error = if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        "Connection refused".to_string()
    } else if e.is_redirect() {
        "Too many redirects".to_string()
    } else {
        e.to_string()
    };
    FetchResult::NetworkError { error }
}
