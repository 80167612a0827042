//! HTTP plumbing shared by the crawl and enrichment stages
//!
//! This module contains:
//! - A process-wide request limiter with a per-minute budget
//! - A resilient HTTP client that absorbs rate limiting, transient
//!   failures, and connection-pool breakage

mod client;
mod limiter;

pub use client::{build_http_client, FetchOutcome, ResilientClient};
pub use limiter::RequestLimiter;
