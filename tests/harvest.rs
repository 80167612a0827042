//! Integration tests for the harvest pipeline
//!
//! These tests use wiremock to stand in for the marketplace and the
//! enrichment API, and drive the full listing → validation → enrichment →
//! persistence cycle end-to-end.

use bowerbird::config::{ApiConfig, Config, CrawlConfig, FieldConfig, MarketConfig, OutputConfig};
use bowerbird::enrich::{CredentialRotator, GraphQlClient, PagedField};
use bowerbird::fetch::{FetchOutcome, RequestLimiter, ResilientClient};
use bowerbird::market::run_harvest;
use bowerbird::storage::{CatalogStore, SqliteCatalog};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_string_contains, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a test configuration pointing at a mock server
fn test_config(base_url: &str, db_path: &str, categories: Vec<&str>) -> Config {
    Config {
        crawl: CrawlConfig {
            requests_per_minute: 6000,
            max_workers: 4,
            stall_passes: 1,
        },
        market: MarketConfig {
            base_url: base_url.to_string(),
            categories: categories.into_iter().map(str::to_string).collect(),
            placeholder_category: "recently-added".to_string(),
        },
        api: ApiConfig {
            endpoint: format!("{}/graphql", base_url),
            tokens: vec!["token-a".to_string()],
            quota_poll_seconds: 1,
        },
        output: OutputConfig {
            database_path: db_path.to_string(),
        },
        fields: FieldConfig::default(),
    }
}

/// Renders a listing page with the given card titles and page count
fn listing_page(names: &[&str], pages: u32) -> String {
    let cards: String = names
        .iter()
        .map(|name| format!(r#"<div class="col"><h3 class="h4">{}</h3></div>"#, name))
        .collect();

    let footer = if pages >= 2 {
        let numbers: String = (2..=pages)
            .map(|page| format!(r#"<a href="?page={page}">{page}</a>"#))
            .collect();
        format!(
            r#"<div class="pagination"><em>1</em>{}<a class="next_page" href="?page=2">Next</a></div>"#,
            numbers
        )
    } else {
        String::new()
    };

    format!("<html><body>{}{}</body></html>", cards, footer)
}

/// Renders a detail page linking to the given repository
fn detail_page(repo_url: &str, verified: bool) -> String {
    let marker = if verified {
        "<div>Verified creator</div>"
    } else {
        ""
    };
    format!(
        r#"<html><body><aside><h5>Links</h5><a href="{}">repository</a></aside>{}</body></html>"#,
        repo_url, marker
    )
}

/// Mounts the quota probe answering every credential with plenty of quota
async fn mount_quota_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("rateLimit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "rateLimit": { "remaining": 5000, "resetAt": "2099-01-01T00:00:00Z" } }
        })))
        .mount(server)
        .await;
}

/// Mounts single-page responses for every enrichment field
async fn mount_enrichment_fields(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("releases(first"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "repositoryOwner": { "login": "octo", "repository": { "name": "repo",
                "releases": { "totalCount": 1, "edges": [
                    { "cursor": "r0", "node": { "tag": { "name": "v1" }, "publishedAt": "2022-03-10T12:30:00Z" } }
                ] } } } }
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("issues(first"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "repositoryOwner": { "login": "octo", "repository": { "name": "repo",
                "issues": { "totalCount": 2, "edges": [
                    { "cursor": "i0", "node": { "state": "OPEN" } },
                    { "cursor": "i1", "node": { "state": "CLOSED" } }
                ] } } } }
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("mentionableUsers(first"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "repositoryOwner": { "login": "octo", "repository": { "name": "repo",
                "mentionableUsers": { "totalCount": 1, "edges": [
                    { "cursor": "u0", "node": { "login": "octocat" } }
                ] } } } }
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("stargazerCount"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "repositoryOwner": { "login": "octo", "repository": { "name": "repo",
                "stargazerCount": 42 } } }
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("watchers {"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "repositoryOwner": { "login": "octo", "repository": { "name": "repo",
                "watchers": { "totalCount": 7 } } } }
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("forks {"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "repositoryOwner": { "login": "octo", "repository": { "name": "repo",
                "forks": { "totalCount": 3 } } } }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/[^/]+/[^/]+/network/dependents$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r##"<html><body><div id="dependents"><a href="#">5 Repositories</a></div></body></html>"##,
        ))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_harvest_and_idempotence() {
    let server = MockServer::start().await;
    let base = server.uri();

    // Two listing pages: one valid candidate on each, plus one candidate
    // whose detail page does not exist
    Mock::given(method("GET"))
        .and(path("/marketplace"))
        .and(query_param("category", "security"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(
            &["Super Linter", "Ghost Action"],
            2,
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/marketplace"))
        .and(query_param("category", "security"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(listing_page(&["Deploy Thing"], 2)),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/marketplace/actions/super-linter"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page(
            &format!("{}/octo/super-linter", base),
            true,
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/marketplace/actions/deploy-thing"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page(
            &format!("{}/acme/deploy-thing", base),
            false,
        )))
        .mount(&server)
        .await;

    // No mock for /marketplace/actions/ghost-action: wiremock answers 404,
    // which is exactly the "no detail page" rejection

    Mock::given(method("GET"))
        .and(path("/octo/super-linter"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/acme/deploy-thing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    mount_quota_ok(&server).await;
    mount_enrichment_fields(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let db_path = db_path.to_str().unwrap();

    run_harvest(test_config(&base, db_path, vec!["security"]))
        .await
        .expect("harvest failed");

    let store = SqliteCatalog::new(Path::new(db_path)).expect("failed to open database");
    assert_eq!(store.count_entries().unwrap(), 2);
    assert_eq!(
        store.lookup_category("octo", "super-linter").unwrap(),
        Some("security".to_string())
    );
    assert_eq!(
        store.lookup_category("acme", "deploy-thing").unwrap(),
        Some("security".to_string())
    );

    let versions = store.versions_for("octo", "super-linter").unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].tag.as_deref(), Some("v1"));
    assert_eq!(versions[0].published_at, "2022-03-10 12:30:00");

    let issues = store.issues_for("octo", "super-linter").unwrap().unwrap();
    assert_eq!((issues.open, issues.closed), (1, 2));

    assert_eq!(
        store.contributors_for("octo", "super-linter").unwrap(),
        vec!["octocat"]
    );
    drop(store);

    // A second harvest against the same upstream stores nothing new
    run_harvest(test_config(&base, db_path, vec!["security"]))
        .await
        .expect("second harvest failed");

    let store = SqliteCatalog::new(Path::new(db_path)).unwrap();
    assert_eq!(store.count_entries().unwrap(), 2);
}

#[tokio::test]
async fn test_empty_category_halts_immediately() {
    let server = MockServer::start().await;
    let base = server.uri();

    // Page 1 renders no pagination footer: the category is empty
    Mock::given(method("GET"))
        .and(path("/marketplace"))
        .and(query_param("category", "no-such-category"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body><p>No results</p></body></html>"),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let db_path = db_path.to_str().unwrap();

    run_harvest(test_config(&base, db_path, vec!["no-such-category"]))
        .await
        .expect("harvest failed");

    let store = SqliteCatalog::new(Path::new(db_path)).unwrap();
    assert_eq!(store.count_entries().unwrap(), 0);
}

#[tokio::test]
async fn test_retry_after_is_honored() {
    let server = MockServer::start().await;

    // First response rate-limits with a one-second Retry-After, then the
    // same URL answers normally
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_body_string("done"))
        .mount(&server)
        .await;

    let limiter = Arc::new(RequestLimiter::new(1000));
    let client = ResilientClient::new(limiter).unwrap();

    let start = Instant::now();
    let outcome = client
        .fetch(&format!("{}/slow", server.uri()))
        .await
        .unwrap();

    assert_eq!(outcome.into_success().as_deref(), Some("done"));
    assert!(
        start.elapsed() >= Duration::from_secs(1),
        "retry happened after {:?}, before the Retry-After delay",
        start.elapsed()
    );
}

#[tokio::test]
async fn test_not_found_is_terminal() {
    let server = MockServer::start().await;

    let limiter = Arc::new(RequestLimiter::new(1000));
    let client = ResilientClient::new(limiter).unwrap();

    let outcome = client
        .fetch(&format!("{}/missing", server.uri()))
        .await
        .unwrap();

    assert!(matches!(outcome, FetchOutcome::NotFound));
}

#[tokio::test]
async fn test_pagination_totality_with_credential_rotation() {
    let server = MockServer::start().await;
    let endpoint = format!("{}/graphql", server.uri());

    // The first credential is exhausted; the second has quota. Data mocks
    // only answer the second credential, so the fetch proves the rotation.
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("rateLimit"))
        .and(header("authorization", "token tired"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "rateLimit": { "remaining": 0, "resetAt": "2099-01-01T00:00:00Z" } }
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("rateLimit"))
        .and(header("authorization", "token fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "rateLimit": { "remaining": 5000, "resetAt": "2099-01-01T00:00:00Z" } }
        })))
        .mount(&server)
        .await;

    // Page 1: 100 of 150 records
    let first_page: Vec<_> = (0..100)
        .map(|i| {
            json!({
                "cursor": format!("c{}", i),
                "node": { "tag": { "name": format!("v{}", i) }, "publishedAt": "2022-01-01T00:00:00Z" }
            })
        })
        .collect();

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("releases(first"))
        .and(header("authorization", "token fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "repositoryOwner": { "login": "octo", "repository": { "name": "repo",
                "releases": { "totalCount": 150, "edges": first_page } } } }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    // Page 2 must carry the last cursor of page 1
    let second_page: Vec<_> = (100..150)
        .map(|i| {
            json!({
                "cursor": format!("c{}", i),
                "node": { "tag": { "name": format!("v{}", i) }, "publishedAt": "2022-01-01T00:00:00Z" }
            })
        })
        .collect();

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("releases(first"))
        .and(body_string_contains("c99"))
        .and(header("authorization", "token fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "repositoryOwner": { "login": "octo", "repository": { "name": "repo",
                "releases": { "totalCount": 150, "edges": second_page } } } }
        })))
        .mount(&server)
        .await;

    let rotator = CredentialRotator::new(
        endpoint.clone(),
        vec!["tired".to_string(), "fresh".to_string()],
        Duration::from_secs(1),
    )
    .unwrap();
    let api = GraphQlClient::new(endpoint, rotator, Arc::new(RequestLimiter::new(10000))).unwrap();

    let edges = api
        .fetch_all("octo", "repo", PagedField::Releases)
        .await
        .unwrap();

    assert_eq!(edges.len(), 150);
    assert_eq!(edges[0]["node"]["tag"]["name"], "v0");
    assert_eq!(edges[149]["node"]["tag"]["name"], "v149");
}

#[tokio::test]
async fn test_quota_error_reissues_same_page() {
    let server = MockServer::start().await;
    let endpoint = format!("{}/graphql", server.uri());

    mount_quota_ok(&server).await;

    // The first data request hits an in-band rate-limit error; the retry of
    // the same query succeeds
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("issues(first"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{ "type": "RATE_LIMITED", "message": "quota exhausted" }]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("issues(first"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "repositoryOwner": { "login": "octo", "repository": { "name": "repo",
                "issues": { "totalCount": 1, "edges": [
                    { "cursor": "i0", "node": { "state": "OPEN" } }
                ] } } } }
        })))
        .mount(&server)
        .await;

    let rotator = CredentialRotator::new(
        endpoint.clone(),
        vec!["token-a".to_string()],
        Duration::from_secs(1),
    )
    .unwrap();
    let api = GraphQlClient::new(endpoint, rotator, Arc::new(RequestLimiter::new(10000))).unwrap();

    let edges = api
        .fetch_all("octo", "repo", PagedField::Issues)
        .await
        .unwrap();

    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0]["node"]["state"], "OPEN");
}

#[tokio::test]
async fn test_cross_category_promotion_is_one_way() {
    let server = MockServer::start().await;
    let base = server.uri();

    for category in ["recently-added", "security"] {
        Mock::given(method("GET"))
            .and(path("/marketplace"))
            .and(query_param("category", category))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(listing_page(&["Super Linter"], 2)),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/marketplace"))
            .and(query_param("category", category))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[], 2)))
            .mount(&server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/marketplace/actions/super-linter"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page(
            &format!("{}/octo/super-linter", base),
            true,
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/octo/super-linter"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    mount_quota_ok(&server).await;
    mount_enrichment_fields(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let db_path = db_path.to_str().unwrap();

    // Discovered under the placeholder category first
    run_harvest(test_config(&base, db_path, vec!["recently-added"]))
        .await
        .unwrap();
    {
        let store = SqliteCatalog::new(Path::new(db_path)).unwrap();
        assert_eq!(
            store.lookup_category("octo", "super-linter").unwrap(),
            Some("recently-added".to_string())
        );
    }

    // Re-discovery under a real category promotes it
    run_harvest(test_config(&base, db_path, vec!["security"]))
        .await
        .unwrap();
    {
        let store = SqliteCatalog::new(Path::new(db_path)).unwrap();
        assert_eq!(
            store.lookup_category("octo", "super-linter").unwrap(),
            Some("security".to_string())
        );
    }

    // Seeing it under the placeholder again never reverts it
    run_harvest(test_config(&base, db_path, vec!["recently-added"]))
        .await
        .unwrap();
    let store = SqliteCatalog::new(Path::new(db_path)).unwrap();
    assert_eq!(
        store.lookup_category("octo", "super-linter").unwrap(),
        Some("security".to_string())
    );
    assert_eq!(store.count_entries().unwrap(), 1);
}
