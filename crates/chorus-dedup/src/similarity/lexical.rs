//! Token-overlap similarity used when no embedding provider can answer.

use std::collections::BTreeSet;

use chorus_core::models::normalize_content;

/// Lower-cased alphanumeric tokens of `text`.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    normalize_content(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Jaccard overlap of the token sets of `a` and `b`. Zero when either is empty.
pub fn lexical_similarity(a: &str, b: &str) -> f64 {
    let (ta, tb) = (tokenize(a), tokenize(b));
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let shared = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    shared as f64 / union as f64
}
