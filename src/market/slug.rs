//! Display-name formatting
//!
//! Listing cards show a human display name; detail pages are addressed by a
//! URL slug derived from it. The transformation must match what the
//! marketplace itself does when it builds detail-page URLs, otherwise valid
//! entries look like 404s.

/// Formats a raw display name into the slug used by detail-page URLs
///
/// Steps, in order: lowercase, strip embedded markup, decode HTML entities,
/// turn separator sequences into hyphens, replace anything outside
/// `[0-9a-z_-]` with a hyphen, trim edge hyphens, collapse runs of hyphens.
pub fn slugify(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let stripped = strip_tags(&lowered);
    let decoded = html_escape::decode_html_entities(stripped.trim()).to_string();

    let hyphenated = decoded.replace(" - ", "-").replace(' ', "-");
    let cleaned: String = hyphenated
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();

    collapse_hyphens(cleaned.trim_matches('-'))
}

/// Drops anything between `<` and `>`
fn strip_tags(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => output.push(c),
            _ => {}
        }
    }
    output
}

/// Collapses runs of hyphens into a single one
fn collapse_hyphens(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut previous_hyphen = false;
    for c in input.chars() {
        if c == '-' {
            if !previous_hyphen {
                output.push(c);
            }
            previous_hyphen = true;
        } else {
            output.push(c);
            previous_hyphen = false;
        }
    }
    output
}
