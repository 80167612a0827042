//! Bowerbird: a marketplace catalog harvester
//!
//! This crate crawls the paginated category listings of a web marketplace,
//! validates each candidate entry against its detail page, enriches accepted
//! entries through a cursor-paginated API with rotating credentials, and
//! persists the results to SQLite one entry at a time.

pub mod config;
pub mod enrich;
pub mod fetch;
pub mod market;
pub mod storage;

use thiserror::Error;

/// Main error type for Bowerbird operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Enrichment API error: {0}")]
    Api(#[from] enrich::ApiError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Category discovery failed: marketplace root listing unavailable")]
    CategoryDiscovery,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Bowerbird operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use fetch::{FetchOutcome, RequestLimiter, ResilientClient};
pub use market::{run_harvest, Coordinator, Discovery};
pub use storage::{CatalogStore, SqliteCatalog};
