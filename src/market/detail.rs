//! Detail-page extraction
//!
//! A candidate's detail page is what turns a listed name into a catalog
//! entry: the sidebar links to the backing repository, and a marker shows
//! whether the publisher is verified.

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Marker text shown on detail pages of entries from verified publishers
const VERIFIED_MARKER: &str = "Verified creator";

/// What a detail page yields for a candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailPage {
    /// Outbound link to the backing repository
    pub repo_url: String,

    /// Whether the publisher carries the verified marker
    pub verified: bool,
}

/// Extracts the repository link and verified marker from a detail page
///
/// Returns `None` when the page has no sidebar repository link, which
/// rejects the candidate.
pub fn extract_detail(html: &str) -> Option<DetailPage> {
    let document = Html::parse_document(html);
    let repo_url = sidebar_link(&document)?;
    let verified = html.contains(VERIFIED_MARKER);

    Some(DetailPage { repo_url, verified })
}

/// Finds the first anchor following the sidebar "Links" heading
fn sidebar_link(document: &Html) -> Option<String> {
    let headings = Selector::parse("h5").ok()?;

    for heading in document.select(&headings) {
        let text: String = heading.text().collect();
        if !text.contains("Links") {
            continue;
        }

        for node in heading.next_siblings() {
            if let Some(element) = ElementRef::wrap(node) {
                if element.value().name() == "a" {
                    return element.value().attr("href").map(str::to_string);
                }
            }
        }
    }

    None
}

/// Splits a repository URL into its (owner, repository) pair
///
/// Returns `None` for URLs that do not carry both path segments, which
/// rejects the candidate.
pub fn split_repo_url(repo_url: &str) -> Option<(String, String)> {
    let url = Url::parse(repo_url).ok()?;
    let mut segments = url.path_segments()?;

    let owner = segments.next()?.to_string();
    let repository = segments.next()?.to_string();

    if owner.is_empty() || repository.is_empty() {
        return None;
    }

    Some((owner, repository))
}
