//! Marketplace crawling
//!
//! This module discovers catalog entries on the marketplace:
//! - Listing pages are walked per category by a pool of workers
//! - Candidate names are normalized into detail-page slugs
//! - Candidates are validated against their detail page and outbound
//!   repository link
//! - Repeated passes over a category converge once no pass discovers
//!   anything new

mod coordinator;
mod crawler;
mod detail;
mod listing;
mod slug;

pub use coordinator::{run_harvest, Coordinator};
pub use crawler::{CrawlPass, Discovery, ListingCrawler};
pub use detail::{extract_detail, split_repo_url, DetailPage};
pub use listing::{extract_candidates, extract_categories, extract_page_count};
pub use slug::slugify;
