use std::collections::HashSet;

use crate::normalizer::normalize;

/// Domain terms that add a bonus when both names share them.
pub const DOMAIN_KEYWORDS: [&str; 7] = [
    "rights",
    "nature",
    "environmental",
    "indigenous",
    "constitutional",
    "treaty",
    "development",
];

const CONTAINMENT_SCORE: f64 = 0.8;
const KEYWORD_BONUS: f64 = 0.2;

/// Fuzzy name similarity in `[0.0, 1.0]`.
///
/// Identical normalized names score 1.0. A name wholly contained in the
/// other scores 0.8. Anything else scores word-level Jaccard overlap plus a
/// flat 0.2 when they share any domain keyword, capped at 1.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let norm_a = normalize(a);
    let norm_b = normalize(b);

    if norm_a.is_empty() || norm_b.is_empty() {
        return 0.0;
    }
    if norm_a == norm_b {
        return 1.0;
    }
    if norm_a.contains(&norm_b) || norm_b.contains(&norm_a) {
        return CONTAINMENT_SCORE;
    }

    let words_a: HashSet<&str> = norm_a.split_whitespace().collect();
    let words_b: HashSet<&str> = norm_b.split_whitespace().collect();

    let shared = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    if union == 0 {
        return 0.0;
    }
    let jaccard = shared as f64 / union as f64;

    let shares_keyword = DOMAIN_KEYWORDS
        .iter()
        .any(|keyword| words_a.contains(*keyword) && words_b.contains(*keyword));

    if shares_keyword {
        (jaccard + KEYWORD_BONUS).min(1.0)
    } else {
        jaccard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_after_normalization() {
        assert_eq!(similarity("The Paris Agreement", "paris agreement"), 1.0);
        assert_eq!(similarity("RoN", "Rights of Nature"), 1.0);
    }

    #[test]
    fn containment_scores_point_eight() {
        assert_eq!(similarity("Paris Agreement", "Paris Agreement on Climate"), 0.8);
        assert_eq!(similarity("Paris Agreement on Climate", "Paris Agreement"), 0.8);
    }

    #[test]
    fn jaccard_with_keyword_bonus() {
        // {indigenous, rights, declaration} vs {indigenous, rights, movement, charter}
        // shares 2 of 5 words, one flat bonus however many keywords match.
        let score =
            similarity("Indigenous Rights Declaration", "Indigenous Rights Movement Charter");
        assert!((score - 0.6).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn unrelated_or_empty_names_score_zero() {
        assert_eq!(similarity("Whanganui River", "Atrato Basin"), 0.0);
        assert_eq!(similarity("", "Atrato Basin"), 0.0);
        assert_eq!(similarity("(draft)", "(draft)"), 0.0);
    }

    #[test]
    fn score_is_symmetric_and_bounded() {
        let pairs = [
            ("Rights of Nature", "Nature Rights Treaty"),
            ("Earth Jurisprudence", "Wild Law"),
            ("Environmental Treaty Development", "treaty development environmental rights nature"),
        ];
        for (a, b) in pairs {
            let forward = similarity(a, b);
            assert_eq!(forward, similarity(b, a));
            assert!((0.0..=1.0).contains(&forward));
        }
    }
}
