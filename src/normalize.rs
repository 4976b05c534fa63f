//! Text and URL Normalization Module
//!
//! Provides functions to:
//! - Collapse whitespace and lower-case text for comparison
//! - Match keywords with an acronym-aware word-boundary policy
//! - Resolve relative links against the page they were found on

use regex::Regex;
use url::Url;

/// Keywords this short (and purely alphabetic) are treated as acronyms.
const ACRONYM_MAX_LEN: usize = 3;

/// Normalize text for comparison (collapse whitespace, trim, lowercase)
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Collapse whitespace but keep the original case. Used for display values
/// such as titles and locations.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Check whether `keyword` occurs in `text`.
///
/// Matching is case-insensitive. Short alphabetic keywords ("RN", "OR",
/// "FT") must also stand as whole words so that "RN" does not hit
/// "Partition". Everything else is a substring test on normalized text.
pub fn keyword_in_text(text: &str, keyword: &str) -> bool {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return false;
    }

    if is_acronym(keyword) {
        let pattern = format!(r"(?i)\b{}\b", regex::escape(keyword));
        if let Ok(re) = Regex::new(&pattern) {
            return re.is_match(text);
        }
    }

    normalize_text(text).contains(&normalize_text(keyword))
}

/// True if any keyword in the list occurs in `text`.
pub fn any_keyword_in_text<S: AsRef<str>>(text: &str, keywords: &[S]) -> bool {
    keywords.iter().any(|kw| keyword_in_text(text, kw.as_ref()))
}

fn is_acronym(keyword: &str) -> bool {
    keyword.chars().count() <= ACRONYM_MAX_LEN && keyword.chars().all(|c| c.is_alphabetic())
}

/// `javascript:` pseudo-links never lead to a page.
pub fn is_javascript_href(href: &str) -> bool {
    href.trim().to_lowercase().starts_with("javascript:")
}

/// Resolve a link against the URL of the page it appeared on.
/// Returns `None` when either side cannot be parsed.
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base.trim()).ok()?;
    base.join(href.trim()).ok().map(|u| u.to_string())
}

/// `scheme://host[:port]` of a URL.
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    })
}
