use std::collections::HashSet;

use kwpipe_core::CandidateKeyword;

/// Drops repeated (lowercased text, match type) pairs, keeping the first occurrence and the
/// input order. With `max_len`, candidates longer than that many characters are dropped too.
pub fn dedup_keywords(
    candidates: impl IntoIterator<Item = CandidateKeyword>,
    max_len: Option<usize>,
) -> Vec<CandidateKeyword> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|kw| max_len.map_or(true, |max| kw.text.chars().count() <= max))
        .filter(|kw| seen.insert(kw.dedup_key()))
        .collect()
}
