//! Resilient HTTP client
//!
//! Wraps a reqwest connection pool and absorbs the failure modes the
//! marketplace exhibits in practice:
//! - HTTP 429 is retried after honoring `Retry-After`, indefinitely
//! - HTTP 404 is a sentinel outcome, never retried
//! - Other non-success statuses are retried a bounded number of times and
//!   then surfaced as a degraded result for the caller to judge
//! - Connection-level failures rebuild the pool and retry indefinitely

use crate::fetch::RequestLimiter;
use crate::HarvestError;
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Extra sleep added on top of a `Retry-After` header value
const RETRY_AFTER_BUFFER: Duration = Duration::from_millis(300);

/// Fallback delay for a 429 response without a usable `Retry-After` header
const RETRY_AFTER_DEFAULT: Duration = Duration::from_secs(1);

/// Delay before retrying after a connection-level failure
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// Immediate retries for non-success statuses other than 429 and 404
const MAX_STATUS_RETRIES: u32 = 3;

/// Pool size used before any category pass has sized the worker pool
const DEFAULT_POOL_SIZE: usize = 10;

/// Outcome of a fetch operation
#[derive(Debug)]
pub enum FetchOutcome {
    /// Successful response with its body
    Success { status: u16, body: String },

    /// HTTP 404: the resource has no page. Never retried.
    NotFound,

    /// A non-success status that survived the bounded retries
    Degraded { status: u16, body: String },
}

impl FetchOutcome {
    /// Returns the body of a successful fetch, `None` otherwise
    pub fn into_success(self) -> Option<String> {
        match self {
            FetchOutcome::Success { body, .. } => Some(body),
            _ => None,
        }
    }
}

struct Pool {
    generation: u64,
    client: Client,
}

/// HTTP client shared by all workers
///
/// The underlying connection pool is replaced when a connection-level
/// failure is observed. The swap is generation-guarded: only the first task
/// to report a failure against the current pool rebuilds it, later callers
/// see the bumped generation and simply retry on the fresh pool.
pub struct ResilientClient {
    pool: RwLock<Pool>,
    limiter: Arc<RequestLimiter>,
    pool_size: AtomicUsize,
    requests: AtomicU64,
}

impl ResilientClient {
    /// Creates a client drawing from the given request budget
    pub fn new(limiter: Arc<RequestLimiter>) -> Result<Self, HarvestError> {
        let client = build_http_client(DEFAULT_POOL_SIZE)?;
        Ok(Self {
            pool: RwLock::new(Pool {
                generation: 0,
                client,
            }),
            limiter,
            pool_size: AtomicUsize::new(DEFAULT_POOL_SIZE),
            requests: AtomicU64::new(0),
        })
    }

    /// Records the worker count for the current category so the next pool
    /// rebuild is sized to it
    pub fn resize_pool(&self, workers: usize) {
        self.pool_size.store(workers.max(1), Ordering::Relaxed);
    }

    /// Total requests issued so far, for progress logging
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Fetches a URL, riding out rate limiting and transient failures
    ///
    /// Only three outcomes reach the caller: a successful body, the
    /// not-found sentinel, or a degraded response after the bounded
    /// retries for unexpected statuses are spent.
    pub async fn fetch(&self, url: &str) -> Result<FetchOutcome, HarvestError> {
        let mut status_retries = 0;

        loop {
            self.limiter.acquire().await;

            let (generation, client) = {
                let pool = self.pool.read().await;
                (pool.generation, pool.client.clone())
            };

            let response = match client.get(url).send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("Connection failure for {}: {}; rebuilding pool", url, e);
                    self.rebuild_pool(generation).await?;
                    tokio::time::sleep(RECONNECT_BACKOFF).await;
                    continue;
                }
            };

            self.requests.fetch_add(1, Ordering::Relaxed);
            let status = response.status();

            if status == StatusCode::NOT_FOUND {
                return Ok(FetchOutcome::NotFound);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let delay = retry_after(&response).unwrap_or(RETRY_AFTER_DEFAULT) + RETRY_AFTER_BUFFER;
                tracing::info!("Rate limited on {}; sleeping {:?}", url, delay);
                tokio::time::sleep(delay).await;
                continue;
            }

            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    // A failure while reading the body is connection-level too
                    tracing::warn!("Body read failed for {}: {}; rebuilding pool", url, e);
                    self.rebuild_pool(generation).await?;
                    tokio::time::sleep(RECONNECT_BACKOFF).await;
                    continue;
                }
            };

            if status.is_success() {
                return Ok(FetchOutcome::Success {
                    status: status.as_u16(),
                    body,
                });
            }

            status_retries += 1;
            if status_retries > MAX_STATUS_RETRIES {
                tracing::warn!(
                    "Giving up on {} after {} retries (last status {})",
                    url,
                    MAX_STATUS_RETRIES,
                    status
                );
                return Ok(FetchOutcome::Degraded {
                    status: status.as_u16(),
                    body,
                });
            }
        }
    }

    /// Swaps in a fresh connection pool sized to the current worker count
    ///
    /// Only the first task to observe a given generation performs the
    /// rebuild; later callers find the generation already bumped and return
    /// immediately to retry on the new pool.
    async fn rebuild_pool(&self, seen_generation: u64) -> Result<(), HarvestError> {
        let mut pool = self.pool.write().await;
        if pool.generation != seen_generation {
            return Ok(());
        }

        pool.client = build_http_client(self.pool_size.load(Ordering::Relaxed))?;
        pool.generation += 1;
        tracing::debug!("Connection pool rebuilt (generation {})", pool.generation);
        Ok(())
    }
}

/// Builds an HTTP client sized for `pool_size` concurrent workers
pub fn build_http_client(pool_size: usize) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(pool_size.max(1))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Reads a `Retry-After` header given in seconds
fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
