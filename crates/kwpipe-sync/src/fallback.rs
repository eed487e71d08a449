//! Keywords synthesized from catalog attributes when no source produced any.

use kwpipe_core::{CandidateKeyword, CatalogProduct, KeywordSource, MatchType};

use crate::dedup::dedup_keywords;

const MAX_TITLE_TOKENS: usize = 10;
const PRIMARY_TITLE_TOKENS: usize = 3;
const PRIMARY_TITLE_PAIRS: usize = 2;

const BRAND_BID: i64 = 150;
const CATEGORY_BID: i64 = 80;
const PRIMARY_TITLE_BID: i64 = 120;
const TITLE_BID: i64 = 60;
const TITLE_PAIR_BID: i64 = 100;
const BRAND_CATEGORY_BID: i64 = 180;

/// Lowercased title words longer than two characters, punctuation treated as whitespace.
pub fn title_tokens(title: &str) -> Vec<String> {
    let cleaned = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { ' ' })
        .collect::<String>();
    cleaned
        .split_whitespace()
        .filter(|token| token.chars().count() > 2)
        .take(MAX_TITLE_TOKENS)
        .map(str::to_string)
        .collect()
}

/// Trimmed, lowercased attribute, if it is longer than one character.
fn attribute(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| v.chars().count() > 1)
}

/// Candidates derived from brand, category, and title; empty when the product has none of them.
pub fn generate_fallback(product: &CatalogProduct, max_len: usize) -> Vec<CandidateKeyword> {
    let brand = attribute(&product.brand);
    let category = attribute(&product.category);
    let tokens = product
        .title
        .as_deref()
        .map(title_tokens)
        .unwrap_or_default();

    let mut out = Vec::new();
    if let Some(brand) = &brand {
        out.push(
            CandidateKeyword::new(brand.as_str(), MatchType::Exact, BRAND_BID, KeywordSource::FallbackBrand)
                .primary(true),
        );
    }
    if let Some(category) = &category {
        out.push(CandidateKeyword::new(
            category.as_str(),
            MatchType::Broad,
            CATEGORY_BID,
            KeywordSource::FallbackCategory,
        ));
    }

    for (i, token) in tokens.iter().enumerate() {
        if i < PRIMARY_TITLE_TOKENS {
            out.extend(MatchType::ALL.into_iter().map(|m| {
                CandidateKeyword::new(token.as_str(), m, PRIMARY_TITLE_BID, KeywordSource::FallbackTitle)
                    .primary(true)
            }));
        } else {
            out.push(CandidateKeyword::new(
                token.as_str(),
                MatchType::Broad,
                TITLE_BID,
                KeywordSource::FallbackTitle,
            ));
        }
    }

    out.extend(tokens.windows(2).enumerate().map(|(i, pair)| {
        CandidateKeyword::new(
            pair.join(" "),
            MatchType::Phrase,
            TITLE_PAIR_BID,
            KeywordSource::FallbackPhrase,
        )
        .primary(i < PRIMARY_TITLE_PAIRS)
    }));

    if let (Some(brand), Some(category)) = (brand, category) {
        out.push(
            CandidateKeyword::new(
                format!("{brand} {category}"),
                MatchType::Phrase,
                BRAND_CATEGORY_BID,
                KeywordSource::FallbackBrandCategory,
            )
            .primary(true),
        );
    }

    dedup_keywords(out, Some(max_len))
}
