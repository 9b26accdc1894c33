//! Crawler module: the HTTP side of a harvest
//!
//! This module contains the concrete collaborators the iteration controller
//! drives over HTTP, including:
//! - HTTP fetching (full pages and title-only prefixes)
//! - HTML parsing, link extraction and rendering detection
//! - Bounded fan-out and politeness delays
//! - The breadth-first site frontier
//! - Title and product detail fetchers

mod details;
mod fetcher;
mod frontier;
mod parser;
mod scheduler;
mod titles;

pub use details::{extract_product, HttpDetailFetcher};
pub use fetcher::{build_http_client, fetch_page, fetch_title, is_html, FetchResult, TITLE_PREFIX_LIMIT};
pub use frontier::SiteFrontier;
pub use parser::{detect_javascript_rendering, extract_sitemap_locs, page_title, parse_html, ParsedPage};
pub use scheduler::{run_bounded, RequestPacer};
pub use titles::HttpTitleFetcher;
