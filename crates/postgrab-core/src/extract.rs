//! Post link recognition
//!
//! Finds post URLs on the supported hosts inside arbitrary text. Matching is
//! purely syntactic: nothing is fetched or validated.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    /// Scheme and host are matched case-insensitively; the path is whatever
    /// non-whitespace run follows the host.
    static ref POST_LINK: Regex =
        Regex::new(r"(?i)https?://(www\.)?(xiaohongshu\.com|xhslink\.com)/\S+")
            .expect("post link pattern is valid");
}

/// Extract post links from `text`
///
/// Links are returned deduplicated by exact string, in order of first
/// occurrence.
pub fn extract_links(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    POST_LINK
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|link| seen.insert(*link))
        .map(str::to_string)
        .collect()
}

/// Check whether `text` contains at least one post link
pub fn contains_link(text: &str) -> bool {
    POST_LINK.is_match(text)
}
