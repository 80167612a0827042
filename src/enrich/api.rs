//! Cursor-paginated GraphQL client
//!
//! Every query runs under the active credential; quota exhaustion rotates
//! credentials and re-issues the same query verbatim, so pagination never
//! skips or duplicates a page over a retry.

use crate::enrich::rotator::CredentialRotator;
use crate::fetch::RequestLimiter;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Records requested per pagination round
const PAGE_SIZE: u32 = 100;

/// Hard cap on pagination rounds per field fetch. The total count reported
/// by the first page is authoritative, but a count that shrinks while the
/// fetch is in flight would otherwise loop forever.
const MAX_PAGE_ROUNDS: u32 = 500;

/// Delay before retrying an API call after a transport failure
const TRANSPORT_RETRY_BACKOFF: Duration = Duration::from_secs(60);

/// Errors from the enrichment API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed API response: {0}")]
    Malformed(String),
}

/// Scalar repository counters fetched in a single query
#[derive(Debug, Clone, Copy)]
pub enum ScalarField {
    Stars,
    Watchers,
    Forks,
}

impl ScalarField {
    fn selection(&self) -> &'static str {
        match self {
            ScalarField::Stars => "stargazerCount",
            ScalarField::Watchers => "watchers { totalCount }",
            ScalarField::Forks => "forks { totalCount }",
        }
    }

    fn extract(&self, repository: &Value) -> Option<i64> {
        match self {
            ScalarField::Stars => repository["stargazerCount"].as_i64(),
            ScalarField::Watchers => repository["watchers"]["totalCount"].as_i64(),
            ScalarField::Forks => repository["forks"]["totalCount"].as_i64(),
        }
    }
}

/// Cursor-paginated repository connections
#[derive(Debug, Clone, Copy)]
pub enum PagedField {
    Releases,
    Issues,
    Contributors,
}

impl PagedField {
    /// The connection's field name in the response payload
    pub fn key(&self) -> &'static str {
        match self {
            PagedField::Releases => "releases",
            PagedField::Issues => "issues",
            PagedField::Contributors => "mentionableUsers",
        }
    }

    fn selection(&self, after: Option<&str>) -> String {
        let after_clause = match after {
            Some(cursor) => format!(", after: \"{}\"", cursor),
            None => String::new(),
        };

        match self {
            PagedField::Releases => format!(
                "releases(first: {PAGE_SIZE}{after_clause}) {{ totalCount edges {{ cursor node {{ tag {{ name }} publishedAt }} }} }}"
            ),
            PagedField::Issues => format!(
                "issues(first: {PAGE_SIZE}{after_clause}) {{ totalCount edges {{ cursor node {{ state }} }} }}"
            ),
            PagedField::Contributors => format!(
                "mentionableUsers(first: {PAGE_SIZE}{after_clause}) {{ totalCount edges {{ cursor node {{ login }} }} }}"
            ),
        }
    }
}

/// GraphQL client with credential rotation and cursor pagination
pub struct GraphQlClient {
    endpoint: String,
    rotator: CredentialRotator,
    limiter: Arc<RequestLimiter>,
    http: reqwest::Client,
}

impl GraphQlClient {
    pub fn new(
        endpoint: String,
        rotator: CredentialRotator,
        limiter: Arc<RequestLimiter>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            endpoint,
            rotator,
            limiter,
            http,
        })
    }

    /// Fetches a scalar repository counter
    pub async fn scalar_count(
        &self,
        owner: &str,
        repository: &str,
        field: ScalarField,
    ) -> Result<i64, ApiError> {
        let query = repository_query(owner, repository, field.selection());
        let payload = self.post(&query).await?;

        field
            .extract(&payload["data"]["repositoryOwner"]["repository"])
            .ok_or_else(|| {
                ApiError::Malformed(format!(
                    "missing scalar field in response for {}/{}",
                    owner, repository
                ))
            })
    }

    /// Fetches every record of a paginated connection
    ///
    /// Accumulates edges until the total count reported by the first page is
    /// reached; the count is not re-read on later pages. Records whose node
    /// fields were deleted upstream are kept as-is so the accumulated length
    /// stays in step with the reported total.
    pub async fn fetch_all(
        &self,
        owner: &str,
        repository: &str,
        field: PagedField,
    ) -> Result<Vec<Value>, ApiError> {
        let mut edges: Vec<Value> = Vec::new();
        let mut total: Option<u64> = None;
        let mut cursor: Option<String> = None;

        for _round in 0..MAX_PAGE_ROUNDS {
            let query = repository_query(owner, repository, &field.selection(cursor.as_deref()));
            let payload = self.post(&query).await?;

            let connection = &payload["data"]["repositoryOwner"]["repository"][field.key()];
            if connection.is_null() {
                return Err(ApiError::Malformed(format!(
                    "missing {} connection for {}/{}",
                    field.key(),
                    owner,
                    repository
                )));
            }

            if total.is_none() {
                total = Some(connection["totalCount"].as_u64().ok_or_else(|| {
                    ApiError::Malformed(format!("missing {} total count", field.key()))
                })?);
            }

            let page = connection["edges"].as_array().cloned().unwrap_or_default();
            edges.extend(page);

            if edges.len() as u64 >= total.unwrap_or(0) {
                return Ok(edges);
            }

            cursor = edges
                .last()
                .and_then(|edge| edge["cursor"].as_str())
                .map(str::to_string);
            if cursor.is_none() {
                return Err(ApiError::Malformed(format!(
                    "no cursor to continue {} pagination for {}/{}",
                    field.key(),
                    owner,
                    repository
                )));
            }
        }

        tracing::warn!(
            "Pagination cap reached for {} of {}/{}; returning {} records",
            field.key(),
            owner,
            repository,
            edges.len()
        );
        Ok(edges)
    }

    /// Issues one query under the active credential
    ///
    /// Quota exhaustion (HTTP 403 or an in-band rate-limit error) rotates
    /// credentials via the rotator's wait loop and re-issues the query.
    /// Transport failures back off and retry.
    async fn post(&self, query: &str) -> Result<Value, ApiError> {
        loop {
            self.rotator.wait_for_quota().await?;
            self.limiter.acquire().await;

            let body = json!({ "query": query });
            let response = match self
                .http
                .post(&self.endpoint)
                .header(
                    "Authorization",
                    format!("token {}", self.rotator.active_token()),
                )
                .json(&body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("API request failed: {}; retrying", e);
                    tokio::time::sleep(TRANSPORT_RETRY_BACKOFF).await;
                    continue;
                }
            };

            if response.status().as_u16() == 403 {
                tracing::info!("Active credential out of quota; rotating");
                continue;
            }

            let payload: Value = match response.json().await {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!("API response read failed: {}; retrying", e);
                    tokio::time::sleep(TRANSPORT_RETRY_BACKOFF).await;
                    continue;
                }
            };

            if is_quota_error(&payload) {
                tracing::info!("API reported a rate-limit error; rotating credentials");
                continue;
            }

            return Ok(payload);
        }
    }
}

/// Builds the repository wrapper around a field selection
fn repository_query(owner: &str, repository: &str, selection: &str) -> String {
    format!(
        "{{ repositoryOwner(login: \"{}\") {{ login repository(name: \"{}\") {{ name {} }} }} }}",
        owner, repository, selection
    )
}

/// Rate-limit errors can arrive with HTTP 200 and an in-band errors array
fn is_quota_error(payload: &Value) -> bool {
    payload["errors"]
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .any(|error| error["type"].as_str() == Some("RATE_LIMITED"))
        })
        .unwrap_or(false)
}
