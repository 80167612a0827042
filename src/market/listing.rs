//! Listing-page extraction
//!
//! Listing pages carry three things the crawl needs: the candidate card
//! titles, a pagination footer with the highest page number, and (on the
//! marketplace root) the category navigation.

use scraper::{Html, Selector};

/// Extracts candidate display names from a category listing page
///
/// Candidates are the card titles; a page with no cards yields an empty
/// list. Titles are returned raw, before slug normalization.
pub fn extract_candidates(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = match Selector::parse("h3.h4") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    document
        .select(&selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
        .collect()
}

/// Reads the highest page number from the pagination footer of page 1
///
/// The marketplace renders no pagination footer for empty categories, and a
/// footer needs at least a current-page marker plus one more element to
/// carry a page count. Anything less means zero pages.
pub fn extract_page_count(html: &str) -> u32 {
    let document = Html::parse_document(html);
    let selector = match Selector::parse(".pagination a, .pagination em") {
        Ok(selector) => selector,
        Err(_) => return 0,
    };

    let numbers: Vec<String> = document
        .select(&selector)
        .filter(|element| !element.value().classes().any(|class| class == "next_page"))
        .map(|element| element.text().collect::<String>().trim().to_string())
        .collect();

    if numbers.len() < 2 {
        return 0;
    }

    numbers
        .last()
        .and_then(|text| text.parse().ok())
        .unwrap_or(0)
}

/// Extracts category labels from the marketplace root navigation
///
/// Labels are normalized the way the marketplace encodes them in listing
/// URLs: non-alphabetic characters dropped, pretty-printing whitespace runs
/// removed, lowercased, remaining spaces hyphenated.
pub fn extract_categories(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = match Selector::parse("nav ul li a") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    let mut categories = Vec::new();
    for element in document.select(&selector) {
        let label = normalize_category_label(&element.text().collect::<String>());
        if !label.is_empty() && !categories.contains(&label) {
            categories.push(label);
        }
    }
    categories
}

/// Normalizes one navigation label into a category slug
fn normalize_category_label(raw: &str) -> String {
    // Keep letters and spaces only; newlines and counts disappear here
    let letters_and_spaces: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphabetic() || *c == ' ')
        .collect();

    // Runs of two or more spaces are pretty-printing artifacts and vanish;
    // single spaces are real word separators
    let mut collapsed = String::with_capacity(letters_and_spaces.len());
    let mut pending_spaces = 0usize;
    for c in letters_and_spaces.chars() {
        if c == ' ' {
            pending_spaces += 1;
        } else {
            if pending_spaces == 1 {
                collapsed.push(' ');
            }
            pending_spaces = 0;
            collapsed.push(c);
        }
    }

    collapsed.to_lowercase().replace(' ', "-")
}
