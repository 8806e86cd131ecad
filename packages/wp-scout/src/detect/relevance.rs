//! Name relevance gate.
//!
//! An unrelated WordPress site can rank for an organization's name. The gate
//! keeps a REST match only if the site's name shares a meaningful word with
//! the organization name.

use std::collections::BTreeSet;

/// Generic corporate and sector words that carry no identity.
pub const STOP_WORDS: &[&str] = &[
    "inc", "llc", "ltd", "corporation", "corp", "company", "co", "the", "and", "of", "for",
    "services", "service", "system", "systems", "center", "centers", "network", "networks",
    "medical", "healthcare", "health", "hospital", "hospitals", "clinic", "clinics", "care",
];

/// Lowercase alphabetic words of `text`, minus stop-words.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .filter(|word| !STOP_WORDS.contains(&word.as_str()))
        .collect()
}

/// True if the two token sets intersect.
///
/// An organization whose name is made only of stop-words has nothing to
/// compare against, so it is never rejected.
pub fn is_relevant(name_tokens: &BTreeSet<String>, site_tokens: &BTreeSet<String>) -> bool {
    name_tokens.is_empty() || !name_tokens.is_disjoint(site_tokens)
}
