//! Dependents-page scraping
//!
//! Dependents are not exposed through the API; the count comes from the
//! repository's dependents page. Repositories that publish several packages
//! keep per-package dependent lists behind a menu, and the recorded sample
//! URL is the variant with the most dependents.

use crate::enrich::DependentsRecord;
use crate::fetch::{FetchOutcome, ResilientClient};
use crate::HarvestError;
use scraper::{Html, Selector};

/// Fetches the dependents summary for a repository
pub async fn fetch_dependents(
    client: &ResilientClient,
    market_base: &str,
    owner: &str,
    repository: &str,
) -> Result<DependentsRecord, HarvestError> {
    let url = format!(
        "{}/{}/{}/network/dependents",
        market_base, owner, repository
    );

    let body = match client.fetch(&url).await? {
        FetchOutcome::Success { body, .. } => body,
        _ => {
            // No dependents page at all still yields a record
            return Ok(DependentsRecord {
                count: 0,
                sample_url: url,
            });
        }
    };

    let mut best_count = extract_dependents_count(&body);
    let mut best_url = url;

    for package_path in extract_package_links(&body) {
        let package_url = if package_path.starts_with("http") {
            package_path
        } else {
            format!("{}{}", market_base, package_path)
        };

        let count = match client.fetch(&package_url).await? {
            FetchOutcome::Success { body, .. } => extract_dependents_count(&body),
            _ => continue,
        };

        if count > best_count {
            best_count = count;
            best_url = package_url;
        }
    }

    Ok(DependentsRecord {
        count: best_count,
        sample_url: best_url,
    })
}

/// Reads the dependent-repository counter from a dependents page
pub(crate) fn extract_dependents_count(html: &str) -> i64 {
    let document = Html::parse_document(html);
    let selector = match Selector::parse("#dependents a") {
        Ok(selector) => selector,
        Err(_) => return 0,
    };

    for anchor in document.select(&selector) {
        let text: String = anchor.text().collect();
        if text.contains("Repositor") {
            let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
            if let Ok(count) = digits.parse() {
                return count;
            }
        }
    }

    0
}

/// Package-menu links on a dependents page
pub(crate) fn extract_package_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = match Selector::parse("#dependents details-menu a[href]") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    document
        .select(&selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(str::to_string)
        .collect()
}
