//! Harvest coordination
//!
//! Drives the whole harvest: category resolution, repeated listing passes
//! per category until discoveries stall, enrichment of new entries, and
//! one-transaction-per-entry persistence. A single listing pass can
//! under-count when the site serves flaky pages, so each category is
//! re-crawled until several consecutive passes find nothing new.

use crate::config::Config;
use crate::enrich::Enricher;
use crate::fetch::{FetchOutcome, RequestLimiter, ResilientClient};
use crate::market::crawler::{CrawlPass, ListingCrawler};
use crate::market::listing::extract_categories;
use crate::storage::{CatalogStore, SqliteCatalog};
use crate::{HarvestError, Result};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Main harvest coordinator structure
pub struct Coordinator {
    config: Config,
    client: Arc<ResilientClient>,
    crawler: ListingCrawler,
    enricher: Enricher,
    store: Arc<Mutex<SqliteCatalog>>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Opens (or creates) the database, builds the shared request limiter
    /// and HTTP client, and wires up the crawler and enricher.
    pub fn new(config: Config) -> Result<Self> {
        let store = SqliteCatalog::new(Path::new(&config.output.database_path))?;

        let limiter = Arc::new(RequestLimiter::new(config.crawl.requests_per_minute));
        let client = Arc::new(ResilientClient::new(Arc::clone(&limiter))?);

        let crawler = ListingCrawler::new(
            Arc::clone(&client),
            config.market.base_url.clone(),
            config.crawl.max_workers,
        );
        let enricher = Enricher::new(&config, Arc::clone(&client), limiter)?;

        Ok(Self {
            config,
            client,
            crawler,
            enricher,
            store: Arc::new(Mutex::new(store)),
        })
    }

    /// Runs the harvest over every category
    pub async fn run(&mut self) -> Result<()> {
        let categories = self.resolve_categories().await?;
        tracing::info!("Harvesting {} categories", categories.len());

        for category in categories {
            self.converge(&category).await?;
        }

        let total = self.store.lock().unwrap().count_entries()?;
        tracing::info!(
            "Harvest complete: {} entries stored, {} requests issued",
            total,
            self.client.request_count()
        );

        Ok(())
    }

    /// Categories from the configuration, or discovered from the
    /// marketplace navigation when none are configured
    async fn resolve_categories(&self) -> Result<Vec<String>> {
        if !self.config.market.categories.is_empty() {
            return Ok(self.config.market.categories.clone());
        }

        let url = format!("{}/marketplace?type=actions", self.config.market.base_url);
        match self.client.fetch(&url).await? {
            FetchOutcome::Success { body, .. } => {
                let categories = extract_categories(&body);
                tracing::info!("Discovered {} categories", categories.len());
                Ok(categories)
            }
            _ => Err(HarvestError::CategoryDiscovery),
        }
    }

    /// Repeats listing passes over a category until `stall-passes`
    /// consecutive passes contribute no new (owner, repository) pair
    ///
    /// Re-running against an already-harvested category therefore performs
    /// `stall-passes` empty passes and halts without duplicating anything.
    async fn converge(&mut self, category: &str) -> Result<()> {
        let mut stall = 0u32;
        let mut pass_number = 0u32;

        while stall < self.config.crawl.stall_passes {
            pass_number += 1;
            let pass = self.crawler.crawl_category(category).await?;

            if pass.page_count == 0 {
                tracing::info!("Category '{}' is empty, nothing to crawl", category);
                return Ok(());
            }

            let new_entries = self.absorb(pass).await?;
            if new_entries > 0 {
                stall = 0;
            } else {
                stall += 1;
            }

            tracing::info!(
                "Category '{}' pass {}: {} new entries (stalled {}/{})",
                category,
                pass_number,
                new_entries,
                stall,
                self.config.crawl.stall_passes
            );
        }

        Ok(())
    }

    /// Folds one pass's discoveries into the store
    ///
    /// Already-stored pairs may have their category promoted away from the
    /// placeholder; unknown pairs are enriched and committed one at a time,
    /// and only those count toward resetting the stall counter.
    async fn absorb(&mut self, pass: CrawlPass) -> Result<usize> {
        let placeholder = &self.config.market.placeholder_category;
        let mut new_entries = 0;

        for discovery in pass.discoveries {
            let existing = self
                .store
                .lock()
                .unwrap()
                .lookup_category(&discovery.owner, &discovery.repository)?;

            match existing {
                Some(stored) => {
                    // Promotion is one-way: off the placeholder, never back
                    if stored == *placeholder && discovery.category != *placeholder {
                        self.store.lock().unwrap().promote_category(
                            &discovery.owner,
                            &discovery.repository,
                            &discovery.category,
                        )?;
                        tracing::debug!(
                            "{}/{} promoted from '{}' to '{}'",
                            discovery.owner,
                            discovery.repository,
                            stored,
                            discovery.category
                        );
                    }
                }
                None => {
                    let entry = match self.enricher.enrich(&discovery).await {
                        Ok(entry) => entry,
                        Err(e) => {
                            tracing::warn!(
                                "Enrichment failed for {}/{}: {}; will retry on a later pass",
                                discovery.owner,
                                discovery.repository,
                                e
                            );
                            continue;
                        }
                    };

                    if self.store.lock().unwrap().insert_entry(&entry)? {
                        new_entries += 1;
                    }
                }
            }
        }

        Ok(new_entries)
    }
}

/// Runs a complete harvest with the given configuration
///
/// # Example
///
/// ```no_run
/// use bowerbird::config::load_config;
/// use bowerbird::market::run_harvest;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// run_harvest(config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest(config: Config) -> Result<()> {
    let mut coordinator = Coordinator::new(config)?;
    coordinator.run().await
}
