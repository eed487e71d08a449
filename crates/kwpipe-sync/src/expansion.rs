//! Derives long-tail candidates from high-confidence suggested keywords.

use kwpipe_core::{scale_bid, CandidateKeyword, KeywordSource, MatchType};

pub const INTENT_MODIFIERS: [&str; 7] = ["best", "cheap", "buy", "sale", "discount", "deal", "review"];

pub const MATCH_TYPE_EXPANSION_FACTOR: f64 = 0.9;
pub const INTENT_FACTOR: f64 = 0.8;
pub const SUB_PHRASE_FACTOR: f64 = 0.7;

/// For each base keyword, the same text under each of the other two match types.
pub fn expand_match_types(base: &[CandidateKeyword]) -> Vec<CandidateKeyword> {
    base.iter()
        .flat_map(|kw| {
            MatchType::ALL
                .into_iter()
                .filter(move |m| *m != kw.match_type)
                .map(move |m| {
                    CandidateKeyword::new(
                        kw.text.clone(),
                        m,
                        scale_bid(kw.suggested_bid_cents, MATCH_TYPE_EXPANSION_FACTOR),
                        KeywordSource::MatchTypeExpansion,
                    )
                })
        })
        .collect()
}

/// Contiguous two-word windows of `text`.
pub fn sub_phrases(text: &str) -> Vec<String> {
    let words = text.split_whitespace().collect::<Vec<_>>();
    words.windows(2).map(|pair| pair.join(" ")).collect()
}

/// Purchase-intent variants and two-word sub-phrases of each seed.
pub fn expand_templates(seeds: &[CandidateKeyword]) -> Vec<CandidateKeyword> {
    let mut out = Vec::new();
    for seed in seeds {
        let intent_bid = scale_bid(seed.suggested_bid_cents, INTENT_FACTOR);
        out.extend(INTENT_MODIFIERS.iter().map(|modifier| {
            CandidateKeyword::new(
                format!("{modifier} {}", seed.text),
                MatchType::Broad,
                intent_bid,
                KeywordSource::ProductIntent,
            )
        }));

        if seed.text.contains(' ') {
            let phrase_bid = scale_bid(seed.suggested_bid_cents, SUB_PHRASE_FACTOR);
            out.extend(sub_phrases(&seed.text).into_iter().map(|phrase| {
                CandidateKeyword::new(phrase, MatchType::Phrase, phrase_bid, KeywordSource::ProductPhrase)
            }));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggested(text: &str, match_type: MatchType, bid: i64) -> CandidateKeyword {
        CandidateKeyword::new(text, match_type, bid, KeywordSource::Suggested).primary(true)
    }

    #[test]
    fn broad_seed_expands_to_exact_and_phrase() {
        let out = expand_match_types(&[suggested("sleep mask", MatchType::Broad, 100)]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text, "sleep mask");
        assert_eq!(out[0].match_type, MatchType::Exact);
        assert_eq!(out[0].suggested_bid_cents, 90);
        assert_eq!(out[0].source, KeywordSource::MatchTypeExpansion);
        assert!(!out[0].is_primary);
        assert_eq!(out[1].match_type, MatchType::Phrase);
        assert_eq!(out[1].suggested_bid_cents, 90);
    }

    #[test]
    fn exact_seed_expands_to_phrase_and_broad() {
        let out = expand_match_types(&[suggested("eye mask", MatchType::Exact, 155)]);
        let types = out.iter().map(|k| k.match_type).collect::<Vec<_>>();
        assert_eq!(types, vec![MatchType::Phrase, MatchType::Broad]);
        assert!(out.iter().all(|k| k.suggested_bid_cents == 140));
    }

    #[test]
    fn templates_emit_intent_modifiers_and_sub_phrases() {
        let out = expand_templates(&[suggested("silk sleep mask", MatchType::Exact, 200)]);
        let intents = out
            .iter()
            .filter(|k| k.source == KeywordSource::ProductIntent)
            .collect::<Vec<_>>();
        assert_eq!(intents.len(), INTENT_MODIFIERS.len());
        assert_eq!(intents[0].text, "best silk sleep mask");
        assert!(intents.iter().all(|k| k.match_type == MatchType::Broad && k.suggested_bid_cents == 160));

        let phrases = out
            .iter()
            .filter(|k| k.source == KeywordSource::ProductPhrase)
            .map(|k| (k.text.as_str(), k.match_type, k.suggested_bid_cents))
            .collect::<Vec<_>>();
        assert_eq!(
            phrases,
            vec![
                ("silk sleep", MatchType::Phrase, 140),
                ("sleep mask", MatchType::Phrase, 140)
            ]
        );
    }

    #[test]
    fn single_word_seed_has_no_sub_phrases() {
        let out = expand_templates(&[suggested("earplugs", MatchType::Broad, 100)]);
        assert_eq!(out.len(), INTENT_MODIFIERS.len());
        assert!(sub_phrases("earplugs").is_empty());
    }
}
