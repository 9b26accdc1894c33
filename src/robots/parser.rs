//! Robots.txt rules bound to the harvester's product token

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// Parsed robots.txt rules for one site, evaluated for one user agent
///
/// Matching is delegated to the robotstxt crate; only `Crawl-delay`, which
/// that crate does not expose, is read here.
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty means allow all)
    content: String,
    /// Product token the rules are evaluated for (e.g. "ProductHarvester")
    agent: String,
}

impl ParsedRobots {
    /// Wraps raw robots.txt content for the given product token
    pub fn from_content(content: &str, agent: &str) -> Self {
        Self {
            content: content.to_string(),
            agent: agent.to_string(),
        }
    }

    /// Rules that allow every URL
    ///
    /// Used when robots.txt is missing, unreachable, or disabled in config.
    pub fn allow_all(agent: &str) -> Self {
        Self::from_content("", agent)
    }

    /// Returns true if the rules place no restriction at all
    pub fn is_unrestricted(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Checks whether `url` may be fetched
    pub fn is_allowed(&self, url: &str) -> bool {
        if self.is_unrestricted() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, &self.agent, url)
    }

    /// Returns the `Crawl-delay` that applies to this agent, if any
    ///
    /// A group naming the agent wins over the `*` group. Consecutive
    /// `User-agent` lines share one group.
    pub fn crawl_delay(&self) -> Option<Duration> {
        let agent = self.agent.to_lowercase();
        let mut group: Vec<String> = Vec::new();
        let mut in_agent_lines = false;
        let mut for_agent = None;
        let mut for_wildcard = None;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            if key == "user-agent" {
                if !in_agent_lines {
                    group.clear();
                }
                group.push(value.to_lowercase());
                in_agent_lines = true;
                continue;
            }
            in_agent_lines = false;

            if key != "crawl-delay" {
                continue;
            }
            let Ok(seconds) = value.parse::<f64>() else {
                continue;
            };
            if seconds < 0.0 || !seconds.is_finite() {
                continue;
            }

            if group.iter().any(|ua| ua != "*" && agent.contains(ua.as_str())) {
                for_agent = Some(seconds);
            } else if group.iter().any(|ua| ua == "*") {
                for_wildcard = Some(seconds);
            }
        }

        for_agent
            .or(for_wildcard)
            .map(Duration::from_secs_f64)
    }
}
