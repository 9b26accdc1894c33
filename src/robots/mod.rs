//! Robots.txt handling module
//!
//! The frontier fetches robots.txt once per run for the harvested site and
//! consults it before queueing any discovered URL.

mod parser;

pub use parser::ParsedRobots;

use reqwest::Client;
use url::Url;

/// Fetches robots.txt for the site that `root` belongs to
///
/// Robots.txt problems never stop a harvest: a 4xx response means no rules
/// exist, and a network failure or 5xx response is logged and treated the
/// same way.
///
/// # Arguments
///
/// * `client` - HTTP client carrying the harvester's user agent
/// * `root` - Any URL on the site
/// * `agent` - Product token the rules are evaluated for
pub async fn fetch_robots(client: &Client, root: &Url, agent: &str) -> ParsedRobots {
    let robots_url = match root.join("/robots.txt") {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("Cannot build robots.txt URL for {}: {}", root, e);
            return ParsedRobots::allow_all(agent);
        }
    };

    let response = match client.get(robots_url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Failed to fetch {}: {}; assuming no rules", robots_url, e);
            return ParsedRobots::allow_all(agent);
        }
    };

    let status = response.status();
    if !status.is_success() {
        tracing::debug!("{} returned HTTP {}; assuming no rules", robots_url, status);
        return ParsedRobots::allow_all(agent);
    }

    match response.text().await {
        Ok(body) => {
            tracing::debug!("Loaded {} ({} bytes)", robots_url, body.len());
            ParsedRobots::from_content(&body, agent)
        }
        Err(e) => {
            tracing::warn!("Failed to read {}: {}; assuming no rules", robots_url, e);
            ParsedRobots::allow_all(agent)
        }
    }
}
