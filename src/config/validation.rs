use crate::config::types::{ApiConfig, Config, CrawlConfig, MarketConfig, OutputConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_market_config(&config.market)?;
    validate_api_config(&config.api, config.fields.needs_api())?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawl behavior configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.requests_per_minute < 1 {
        return Err(ConfigError::Validation(format!(
            "requests_per_minute must be >= 1, got {}",
            config.requests_per_minute
        )));
    }

    if config.max_workers < 1 || config.max_workers > 100 {
        return Err(ConfigError::Validation(format!(
            "max_workers must be between 1 and 100, got {}",
            config.max_workers
        )));
    }

    if config.stall_passes < 1 {
        return Err(ConfigError::Validation(format!(
            "stall_passes must be >= 1, got {}",
            config.stall_passes
        )));
    }

    Ok(())
}

/// Validates marketplace configuration
fn validate_market_config(config: &MarketConfig) -> Result<(), ConfigError> {
    validate_http_url(&config.base_url, "base-url")?;

    if config.base_url.ends_with('/') {
        return Err(ConfigError::Validation(format!(
            "base-url must not end with a slash, got '{}'",
            config.base_url
        )));
    }

    if config.placeholder_category.is_empty() {
        return Err(ConfigError::Validation(
            "placeholder-category cannot be empty".to_string(),
        ));
    }

    for category in &config.categories {
        if category.is_empty() {
            return Err(ConfigError::Validation(
                "category labels cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates enrichment API configuration
fn validate_api_config(config: &ApiConfig, needs_api: bool) -> Result<(), ConfigError> {
    validate_http_url(&config.endpoint, "endpoint")?;

    if needs_api && config.tokens.is_empty() {
        return Err(ConfigError::Validation(
            "at least one API token is required for the enabled enrichment fields".to_string(),
        ));
    }

    if config.tokens.iter().any(|token| token.is_empty()) {
        return Err(ConfigError::Validation(
            "API tokens cannot be empty".to_string(),
        ));
    }

    if config.quota_poll_seconds < 1 {
        return Err(ConfigError::Validation(format!(
            "quota_poll_seconds must be >= 1, got {}",
            config.quota_poll_seconds
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates that a string is an absolute http(s) URL
fn validate_http_url(value: &str, field: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", field, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field, value
        )));
    }

    Ok(())
}
