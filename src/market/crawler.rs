//! Category listing crawler
//!
//! One pass over a category: probe the page count, partition the pages
//! round-robin across a worker pool, validate every candidate each worker
//! finds, and merge the workers' local results after they join. Workers
//! never abort the pass; any per-page or per-candidate failure rejects just
//! that item.

use crate::fetch::{FetchOutcome, ResilientClient};
use crate::market::detail::{extract_detail, split_repo_url};
use crate::market::listing::{extract_candidates, extract_page_count};
use crate::market::slug::slugify;
use crate::Result;
use std::collections::HashSet;
use std::sync::Arc;

/// One validated catalog entry discovered on a listing page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Discovery {
    pub owner: String,
    pub repository: String,

    /// The candidate's detail-page slug
    pub name: String,

    pub category: String,
    pub verified: bool,
}

/// Result of one pass over a category
#[derive(Debug, Default)]
pub struct CrawlPass {
    /// Listing pages the category reported; 0 means the category is empty
    pub page_count: u32,

    pub discoveries: HashSet<Discovery>,
}

/// Walks category listings with a pool of workers
pub struct ListingCrawler {
    client: Arc<ResilientClient>,
    base_url: String,
    max_workers: u32,
}

impl ListingCrawler {
    pub fn new(client: Arc<ResilientClient>, base_url: String, max_workers: u32) -> Self {
        Self {
            client,
            base_url,
            max_workers,
        }
    }

    /// Runs one full pass over a category
    ///
    /// The pass completes only after every worker has processed its whole
    /// page partition.
    pub async fn crawl_category(&self, category: &str) -> Result<CrawlPass> {
        let page_count = self.probe_page_count(category).await?;
        tracing::info!("Category '{}': {} listing pages", category, page_count);

        if page_count == 0 {
            return Ok(CrawlPass::default());
        }

        let workers = self.max_workers.min(page_count).max(1);
        self.client.resize_pool(workers as usize);

        let mut handles = Vec::with_capacity(workers as usize);
        for index in 0..workers {
            let pages = partition_pages(page_count, workers, index);
            let worker = Worker {
                client: Arc::clone(&self.client),
                base_url: self.base_url.clone(),
                category: category.to_string(),
            };
            handles.push(tokio::spawn(async move { worker.walk_pages(pages).await }));
        }

        let mut discoveries = HashSet::new();
        for handle in handles {
            match handle.await {
                Ok(local) => discoveries.extend(local),
                Err(e) => tracing::error!("Listing worker failed: {}", e),
            }
        }

        Ok(CrawlPass {
            page_count,
            discoveries,
        })
    }

    /// Probes page 1 for the category's page count (0 = empty category)
    async fn probe_page_count(&self, category: &str) -> Result<u32> {
        let url = listing_url(&self.base_url, category, 1);
        match self.client.fetch(&url).await? {
            FetchOutcome::Success { body, .. } => Ok(extract_page_count(&body)),
            FetchOutcome::NotFound => Ok(0),
            FetchOutcome::Degraded { status, .. } => {
                tracing::warn!(
                    "Page-count probe for '{}' degraded (status {}); treating as empty",
                    category,
                    status
                );
                Ok(0)
            }
        }
    }
}

/// Round-robin page partition for one worker
///
/// Pages with dense and sparse listings alternate on the site, so
/// contiguous ranges would load workers unevenly.
fn partition_pages(page_count: u32, workers: u32, index: u32) -> Vec<u32> {
    (1..=page_count)
        .filter(|page| page % workers == index)
        .collect()
}

fn listing_url(base_url: &str, category: &str, page: u32) -> String {
    format!(
        "{}/marketplace?category={}&page={}&query=&type=actions",
        base_url, category, page
    )
}

/// One worker's share of a category pass
struct Worker {
    client: Arc<ResilientClient>,
    base_url: String,
    category: String,
}

impl Worker {
    /// Walks the assigned pages in ascending order
    async fn walk_pages(&self, pages: Vec<u32>) -> Vec<Discovery> {
        let mut found = Vec::new();

        for page in pages {
            let url = listing_url(&self.base_url, &self.category, page);
            let body = match self.client.fetch(&url).await {
                Ok(FetchOutcome::Success { body, .. }) => body,
                Ok(_) => {
                    tracing::warn!(
                        "Listing page {} of '{}' unavailable; skipping",
                        page,
                        self.category
                    );
                    continue;
                }
                Err(e) => {
                    tracing::warn!(
                        "Listing page {} of '{}' failed: {}; skipping",
                        page,
                        self.category,
                        e
                    );
                    continue;
                }
            };

            for raw_name in extract_candidates(&body) {
                if let Some(discovery) = self.validate_candidate(&raw_name).await {
                    found.push(discovery);
                }
            }
        }

        found
    }

    /// Validates a raw candidate name into a discovery
    ///
    /// The detail page must exist, it must link to a repository, and that
    /// link must itself resolve. Any missing step rejects the candidate for
    /// this pass.
    async fn validate_candidate(&self, raw_name: &str) -> Option<Discovery> {
        let slug = slugify(raw_name);
        if slug.is_empty() {
            return None;
        }

        let detail_url = format!("{}/marketplace/actions/{}", self.base_url, slug);
        let body = match self.client.fetch(&detail_url).await {
            Ok(FetchOutcome::Success { body, .. }) => body,
            Ok(FetchOutcome::NotFound) => {
                tracing::debug!("Candidate '{}' has no detail page", slug);
                return None;
            }
            Ok(FetchOutcome::Degraded { .. }) => return None,
            Err(e) => {
                tracing::warn!("Detail fetch for '{}' failed: {}", slug, e);
                return None;
            }
        };

        let detail = extract_detail(&body)?;
        let (owner, repository) = split_repo_url(&detail.repo_url)?;

        // The repository behind the entry must answer as well
        match self.client.fetch(&detail.repo_url).await {
            Ok(FetchOutcome::Success { .. }) => {}
            _ => {
                tracing::debug!("Repository link for '{}' did not resolve", slug);
                return None;
            }
        }

        Some(Discovery {
            owner,
            repository,
            name: slug,
            category: self.category.clone(),
            verified: detail.verified,
        })
    }
}
