use serde::Deserialize;

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub classifier: ClassifierConfig,
    pub output: OutputConfig,
}

/// Loop-level settings: what to harvest and how much of it
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    /// Root URL of the site to harvest
    #[serde(rename = "root-url")]
    pub root_url: String,

    /// Number of newly stored products after which the run stops
    #[serde(rename = "target-products")]
    pub target_products: usize,

    /// Number of URLs requested from the frontier per iteration
    #[serde(rename = "batch-size")]
    pub batch_size: usize,

    /// Concurrency cap for title and detail fetches
    #[serde(rename = "concurrent-requests")]
    pub concurrent_requests: usize,

    /// Number of titles sent to the classifier in one call
    #[serde(rename = "classifier-batch-size")]
    pub classifier_batch_size: usize,
}

/// Frontier crawling behavior
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Minimum time between frontier page expansions (milliseconds)
    #[serde(rename = "request-delay", default = "default_request_delay")]
    pub request_delay: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Whether the frontier honours robots.txt
    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_delay: default_request_delay(),
            request_timeout: default_request_timeout(),
            respect_robots: true,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the user agent string: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Which classifier decides whether a title belongs to a product page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    Llm,
    Keywords,
}

/// Classifier configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    pub kind: ClassifierKind,

    /// Chat-completions endpoint (llm only)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model name (llm only)
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key (llm only)
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,

    /// Retries per classification call after the first attempt (llm only)
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Substrings that mark a product page (keywords only)
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    /// Substrings that veto a match (keywords only)
    #[serde(rename = "exclude-keywords", default)]
    pub exclude_keywords: Vec<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory receiving one JSON results file per execution
    #[serde(rename = "results-dir")]
    pub results_dir: String,

    /// Whether titles stored by earlier executions count as already seen
    #[serde(rename = "dedup-across-runs", default = "default_true")]
    pub dedup_across_runs: bool,
}

fn default_request_delay() -> u64 {
    250
}

fn default_request_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_max_retries() -> u32 {
    2
}

fn default_keywords() -> Vec<String> {
    ["/product", "/products/", "/p/", "/item", "/dp/"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
