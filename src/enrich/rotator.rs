//! Credential rotation
//!
//! The enrichment API meters each credential separately. The rotator probes
//! every held credential's remaining quota in order and activates the first
//! one that can still make calls; callers loop on `wait_for_quota` until
//! some credential is usable again. A credential stays active until it is
//! exhausted; there is no per-call round-robin.

use crate::enrich::api::ApiError;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Rotates between interchangeable API credentials
pub struct CredentialRotator {
    endpoint: String,
    tokens: Vec<String>,
    active: AtomicUsize,
    poll_interval: Duration,
    http: Client,
}

impl CredentialRotator {
    /// Creates a rotator over the given credentials
    ///
    /// The first credential starts out active; the first quota probe may
    /// immediately move activation elsewhere.
    pub fn new(
        endpoint: String,
        tokens: Vec<String>,
        poll_interval: Duration,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            endpoint,
            tokens,
            active: AtomicUsize::new(0),
            poll_interval,
            http,
        })
    }

    /// The currently active credential
    pub fn active_token(&self) -> &str {
        &self.tokens[self.active.load(Ordering::Relaxed)]
    }

    /// Probes every credential in order and activates the first one with
    /// remaining quota. Returns `false` when all are exhausted.
    pub async fn has_quota(&self) -> Result<bool, ApiError> {
        for (index, token) in self.tokens.iter().enumerate() {
            let remaining = self.remaining_quota(token).await?;
            if remaining > 0 {
                self.active.store(index, Ordering::Relaxed);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Blocks until some credential has quota, polling on a fixed interval
    pub async fn wait_for_quota(&self) -> Result<(), ApiError> {
        while !self.has_quota().await? {
            tracing::info!(
                "All {} credentials exhausted; sleeping {:?}",
                self.tokens.len(),
                self.poll_interval
            );
            tokio::time::sleep(self.poll_interval).await;
        }
        Ok(())
    }

    /// Queries the quota endpoint for one credential
    async fn remaining_quota(&self, token: &str) -> Result<i64, ApiError> {
        let body = json!({ "query": "{ rateLimit { remaining resetAt } }" });
        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("token {}", token))
            .json(&body)
            .send()
            .await?;

        let payload: Value = response.json().await?;
        payload["data"]["rateLimit"]["remaining"]
            .as_i64()
            .ok_or_else(|| ApiError::Malformed("missing rateLimit.remaining".to_string()))
    }
}
