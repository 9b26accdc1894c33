//! Breadth-first URL frontier for one site
//!
//! The frontier hands out every normalised same-site URL at most once, root
//! first. When fewer URLs are pending than a batch asks for, it expands
//! already-discovered pages in discovery order, waiting the politeness delay
//! between requests.

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{fetch_page, FetchResult};
use crate::crawler::parser::{detect_javascript_rendering, extract_sitemap_locs, parse_html};
use crate::crawler::scheduler::RequestPacer;
use crate::harvest::{Frontier, RenderMode};
use crate::robots::{fetch_robots, ParsedRobots};
use crate::url::{is_asset_url, is_same_site, normalize_url};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use url::Url;

/// Sitemap files read at most (the root sitemap plus nested ones)
const MAX_SITEMAPS: usize = 10;

/// Frontier that discovers URLs by following links on the site
pub struct SiteFrontier {
    client: Client,
    root: Url,
    agent: String,
    respect_robots: bool,
    robots: Option<ParsedRobots>,
    pacer: RequestPacer,
    /// Every URL ever queued or rejected by robots.txt
    seen: HashSet<String>,
    /// Discovered, not yet handed out
    pending: VecDeque<String>,
    /// Discovered, not yet fetched for links
    to_expand: VecDeque<String>,
    /// Final URL and body of the root page, kept from the rendering probe
    root_body: Option<(String, String)>,
    render_mode: RenderMode,
}

impl SiteFrontier {
    /// Creates a frontier bound to `root`
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client carrying the harvester's user agent
    /// * `root` - Normalised root URL; only URLs on the same site are emitted
    /// * `config` - Politeness delay and robots.txt settings
    /// * `agent` - Product token robots.txt rules are evaluated for
    pub fn new(client: Client, root: Url, config: &CrawlerConfig, agent: &str) -> Self {
        let root_key = root.to_string();
        Self {
            client,
            root,
            agent: agent.to_string(),
            respect_robots: config.respect_robots,
            robots: None,
            pacer: RequestPacer::new(Duration::from_millis(config.request_delay)),
            seen: HashSet::from([root_key.clone()]),
            pending: VecDeque::from([root_key.clone()]),
            to_expand: VecDeque::from([root_key]),
            root_body: None,
            render_mode: RenderMode::Static,
        }
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    /// URLs discovered but not yet handed out
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    async fn ensure_robots(&mut self) {
        if self.robots.is_some() {
            return;
        }

        let robots = if self.respect_robots {
            fetch_robots(&self.client, &self.root, &self.agent).await
        } else {
            ParsedRobots::allow_all(&self.agent)
        };
        self.pacer.apply_crawl_delay(robots.crawl_delay());

        let root_key = self.root.to_string();
        if !robots.is_allowed(&root_key) {
            tracing::warn!("robots.txt disallows the root URL {}; nothing to harvest", root_key);
            self.pending.clear();
            self.to_expand.clear();
        }

        self.robots = Some(robots);
    }

    /// Queues a discovered link if it is new, on-site, a page, and allowed
    fn admit(&mut self, link: &str) -> bool {
        let Ok(url) = normalize_url(link) else {
            return false;
        };
        if !is_same_site(&self.root, &url) || is_asset_url(&url) {
            return false;
        }

        let key = url.to_string();
        if !self.seen.insert(key.clone()) {
            return false;
        }

        if let Some(robots) = &self.robots {
            if !robots.is_allowed(&key) {
                tracing::trace!("robots.txt disallows {}", key);
                return false;
            }
        }

        self.pending.push_back(key.clone());
        self.to_expand.push_back(key);
        true
    }

    /// Fetches one page and queues its links
    async fn expand(&mut self, page: &str) {
        let cached = if page == self.root.as_str() {
            self.root_body.take()
        } else {
            None
        };

        let fetched = match cached {
            Some(hit) => Some(hit),
            None => {
                self.pacer.wait_turn().await;
                match fetch_page(&self.client, page).await {
                    FetchResult::Success {
                        final_url, body, ..
                    } => Some((final_url, body)),
                    other => {
                        tracing::debug!("Not expanding {}: {:?}", page, other);
                        None
                    }
                }
            }
        };

        let Some((final_url, body)) = fetched else {
            return;
        };
        let Ok(base) = Url::parse(&final_url) else {
            return;
        };

        let links = parse_html(&body, &base).links;
        let found = links.len();
        let added = links.iter().filter(|link| self.admit(link)).count();
        tracing::debug!("Expanded {}: {} links, {} new", page, found, added);
    }

    /// Queues page URLs listed in `/sitemap.xml` and nested sitemaps
    async fn seed_from_sitemap(&mut self) {
        let Ok(sitemap) = self.root.join("/sitemap.xml") else {
            return;
        };

        let mut sitemaps = VecDeque::from([sitemap.to_string()]);
        let mut visited = HashSet::new();
        let mut added = 0;

        while let Some(sitemap_url) = sitemaps.pop_front() {
            if visited.len() >= MAX_SITEMAPS || !visited.insert(sitemap_url.clone()) {
                continue;
            }

            self.pacer.wait_turn().await;
            let Some(xml) = self.fetch_text(&sitemap_url).await else {
                continue;
            };

            for loc in extract_sitemap_locs(&xml) {
                if loc.to_ascii_lowercase().ends_with(".xml") {
                    sitemaps.push_back(loc);
                } else if self.admit(&loc) {
                    added += 1;
                }
            }
        }

        tracing::info!("Seeded {} URLs from sitemaps", added);
    }

    async fn fetch_text(&self, url: &str) -> Option<String> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Failed to fetch {}: {}", url, e);
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::debug!("{} returned HTTP {}", url, response.status());
            return None;
        }
        response.text().await.ok()
    }
}

#[async_trait]
impl Frontier for SiteFrontier {
    async fn probe_rendering(&mut self) -> Result<RenderMode> {
        self.ensure_robots().await;

        let root = self.root.to_string();
        self.pacer.wait_turn().await;
        let mode = match fetch_page(&self.client, &root).await {
            FetchResult::Success {
                final_url, body, ..
            } => {
                let mode = if detect_javascript_rendering(&body) {
                    RenderMode::JavaScript
                } else {
                    RenderMode::Static
                };
                tracing::debug!("Probed {} (served as {})", root, final_url);
                self.root_body = Some((final_url, body));
                mode
            }
            other => {
                tracing::warn!(
                    "Rendering probe of {} failed ({:?}); assuming static pages",
                    root,
                    other
                );
                RenderMode::Static
            }
        };

        self.render_mode = mode;
        if mode == RenderMode::JavaScript {
            self.seed_from_sitemap().await;
        }

        Ok(mode)
    }

    async fn next_batch(&mut self, size: usize) -> Result<Vec<String>> {
        self.ensure_robots().await;

        while self.pending.len() < size {
            let Some(page) = self.to_expand.pop_front() else {
                break;
            };
            self.expand(&page).await;
        }

        let take = size.min(self.pending.len());
        let batch: Vec<String> = self.pending.drain(..take).collect();
        tracing::debug!(
            "Frontier batch of {} URLs ({} pending, {} to expand)",
            batch.len(),
            self.pending.len(),
            self.to_expand.len()
        );
        Ok(batch)
    }
}
