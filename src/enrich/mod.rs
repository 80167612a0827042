//! Entry enrichment
//!
//! Once a discovery is validated, it is enriched according to the
//! configured field set: release history, issue tallies, and contributor
//! lists through the cursor-paginated API, star/watcher/fork counts through
//! scalar queries, and the dependents summary from the repository's
//! dependents page.

mod api;
mod dependents;
mod rotator;

pub use api::{ApiError, GraphQlClient, PagedField, ScalarField};
pub use rotator::CredentialRotator;

use crate::config::{Config, FieldConfig};
use crate::fetch::{RequestLimiter, ResilientClient};
use crate::market::Discovery;
use crate::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// A fully enriched entry ready for persistence
///
/// Fields disabled in the configuration stay `None` and persist as NULL.
#[derive(Debug, Clone)]
pub struct EnrichedEntry {
    pub owner: String,
    pub repository: String,
    pub name: String,
    pub category: String,
    pub verified: bool,
    pub stars: Option<i64>,
    pub watchers: Option<i64>,
    pub forks: Option<i64>,
    pub versions: Option<Vec<VersionRecord>>,
    pub issues: Option<IssueTally>,
    pub contributors: Option<Vec<String>>,
    pub dependents: Option<DependentsRecord>,
}

/// One release of an entry; the tag is absent when it was deleted upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub published_at: String,
    pub tag: Option<String>,
}

/// Open/closed issue counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IssueTally {
    pub open: i64,
    pub closed: i64,
}

/// Dependents count plus the most-depended-on package page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependentsRecord {
    pub count: i64,
    pub sample_url: String,
}

/// Assembles enriched entries for validated discoveries
pub struct Enricher {
    api: GraphQlClient,
    client: Arc<ResilientClient>,
    fields: FieldConfig,
    market_base: String,
}

impl Enricher {
    pub fn new(
        config: &Config,
        client: Arc<ResilientClient>,
        limiter: Arc<RequestLimiter>,
    ) -> Result<Self> {
        let rotator = CredentialRotator::new(
            config.api.endpoint.clone(),
            config.api.tokens.clone(),
            Duration::from_secs(config.api.quota_poll_seconds),
        )?;
        let api = GraphQlClient::new(config.api.endpoint.clone(), rotator, limiter)?;

        Ok(Self {
            api,
            client,
            fields: config.fields.clone(),
            market_base: config.market.base_url.clone(),
        })
    }

    /// Enriches one discovery with every enabled field
    pub async fn enrich(&self, discovery: &Discovery) -> Result<EnrichedEntry> {
        let owner = &discovery.owner;
        let repository = &discovery.repository;

        let mut entry = EnrichedEntry {
            owner: owner.clone(),
            repository: repository.clone(),
            name: discovery.name.clone(),
            category: discovery.category.clone(),
            verified: discovery.verified,
            stars: None,
            watchers: None,
            forks: None,
            versions: None,
            issues: None,
            contributors: None,
            dependents: None,
        };

        if self.fields.versions {
            let edges = self
                .api
                .fetch_all(owner, repository, PagedField::Releases)
                .await?;
            entry.versions = Some(collect_versions(&edges));
        }

        if self.fields.issues {
            let edges = self
                .api
                .fetch_all(owner, repository, PagedField::Issues)
                .await?;
            entry.issues = Some(tally_issues(&edges));
        }

        if self.fields.contributors {
            let edges = self
                .api
                .fetch_all(owner, repository, PagedField::Contributors)
                .await?;
            entry.contributors = Some(collect_contributors(&edges));
        }

        if self.fields.stars {
            entry.stars = Some(
                self.api
                    .scalar_count(owner, repository, ScalarField::Stars)
                    .await?,
            );
        }

        if self.fields.watchers {
            entry.watchers = Some(
                self.api
                    .scalar_count(owner, repository, ScalarField::Watchers)
                    .await?,
            );
        }

        if self.fields.forks {
            entry.forks = Some(
                self.api
                    .scalar_count(owner, repository, ScalarField::Forks)
                    .await?,
            );
        }

        if self.fields.dependents {
            entry.dependents = Some(
                dependents::fetch_dependents(&self.client, &self.market_base, owner, repository)
                    .await?,
            );
        }

        Ok(entry)
    }
}

/// Maps release edges to version records
///
/// Timestamps are reformatted for storage; a release whose tag was deleted
/// upstream is kept with an empty tag rather than dropped.
fn collect_versions(edges: &[Value]) -> Vec<VersionRecord> {
    edges
        .iter()
        .map(|edge| {
            let node = &edge["node"];
            VersionRecord {
                published_at: node["publishedAt"]
                    .as_str()
                    .map(format_timestamp)
                    .unwrap_or_default(),
                tag: node["tag"]["name"].as_str().map(str::to_string),
            }
        })
        .collect()
}

/// Tallies issue edges into open/closed counts
fn tally_issues(edges: &[Value]) -> IssueTally {
    let mut tally = IssueTally::default();
    for edge in edges {
        match edge["node"]["state"].as_str() {
            Some("OPEN") => tally.open += 1,
            Some("CLOSED") => tally.closed += 1,
            _ => {}
        }
    }
    tally
}

/// Collects contributor logins, sorted
fn collect_contributors(edges: &[Value]) -> Vec<String> {
    let mut logins: Vec<String> = edges
        .iter()
        .filter_map(|edge| edge["node"]["login"].as_str())
        .map(str::to_string)
        .collect();
    logins.sort();
    logins
}

/// Reformats an RFC 3339 API timestamp into the stored representation
fn format_timestamp(raw: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|timestamp| timestamp.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| raw.to_string())
}
