use serde::Deserialize;

/// Main configuration structure for Bowerbird
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlConfig,
    pub market: MarketConfig,
    pub api: ApiConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub fields: FieldConfig,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Upper bound on outbound requests in any trailing minute, shared by
    /// every worker and the enrichment API client
    #[serde(rename = "requests-per-minute")]
    pub requests_per_minute: u32,

    /// Maximum number of workers per category pass; the effective count is
    /// capped by the category's page count
    #[serde(rename = "max-workers")]
    pub max_workers: u32,

    /// Consecutive passes without a new discovery before a category is
    /// considered fully harvested
    #[serde(rename = "stall-passes")]
    pub stall_passes: u32,
}

/// Marketplace endpoints and category selection
#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// Base URL of the marketplace site
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Categories to harvest; empty means discover them from the
    /// marketplace navigation
    #[serde(default)]
    pub categories: Vec<String>,

    /// Category label the marketplace assigns to freshly listed entries.
    /// Stored entries are promoted away from it, never back to it.
    #[serde(rename = "placeholder-category", default = "default_placeholder")]
    pub placeholder_category: String,
}

fn default_placeholder() -> String {
    "recently-added".to_string()
}

/// Enrichment API endpoint and credentials
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// GraphQL endpoint URL
    pub endpoint: String,

    /// API credentials, rotated when the active one runs out of quota
    pub tokens: Vec<String>,

    /// Seconds between quota re-checks while every credential is exhausted
    #[serde(rename = "quota-poll-seconds", default = "default_quota_poll")]
    pub quota_poll_seconds: u64,
}

fn default_quota_poll() -> u64 {
    60
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Per-field enrichment toggles; everything defaults on
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub versions: bool,
    pub dependents: bool,
    pub contributors: bool,
    pub stars: bool,
    pub watchers: bool,
    pub forks: bool,
    pub issues: bool,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            versions: true,
            dependents: true,
            contributors: true,
            stars: true,
            watchers: true,
            forks: true,
            issues: true,
        }
    }
}

impl FieldConfig {
    /// Whether any field requiring an API credential is enabled
    pub fn needs_api(&self) -> bool {
        self.versions
            || self.contributors
            || self.stars
            || self.watchers
            || self.forks
            || self.issues
    }
}
