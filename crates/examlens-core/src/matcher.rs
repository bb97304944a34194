//! Approximate name matching used to resolve student identities.
//!
//! Names are compared after trimming, lowercasing, and collapsing internal
//! whitespace:
//! - identical names score `1.0`;
//! - one name contained in the other scores [`SUBSTRING_SIMILARITY`], so a
//!   short form like "Jon" attaches to "Jonathan Smith";
//! - anything else scores the Ratcliff/Obershelp ratio `2M / T`, where `M`
//!   is the number of characters in the recursively found longest matching
//!   blocks and `T` the combined length.
//!
//! The substring rule makes the score asymmetric in some edge cases; it is a
//! clustering heuristic, not a metric.

use crate::traits::NameMatcher;

/// Score given when one normalized name contains the other.
pub const SUBSTRING_SIMILARITY: f64 = 0.9;

/// Trim, lowercase, and collapse whitespace runs to single spaces.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Similarity of two raw names in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize_name(a);
    let b = normalize_name(b);
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return SUBSTRING_SIMILARITY;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    sequence_ratio(&a, &b)
}

/// Ratcliff/Obershelp similarity of two sequences.
pub fn sequence_ratio<T: PartialEq>(a: &[T], b: &[T]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = matched_len(a, b, 0, a.len(), 0, b.len());
    2.0 * matched as f64 / total as f64
}

/// Characters covered by matching blocks within `a[alo..ahi]` / `b[blo..bhi]`.
fn matched_len<T: PartialEq>(
    a: &[T],
    b: &[T],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> usize {
    let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
    if k == 0 {
        return 0;
    }
    k + matched_len(a, b, alo, i, blo, j) + matched_len(a, b, i + k, ahi, j + k, bhi)
}

/// Longest common block `(i, j, len)`; earliest in `a`, then earliest in `b`.
fn longest_match<T: PartialEq>(
    a: &[T],
    b: &[T],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_len) = (alo, blo, 0);
    // run[j + 1] = length of the common run ending at a[i - 1], b[j]
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for i in alo..ahi {
        for j in blo..bhi {
            curr[j + 1] = if a[i] == b[j] { prev[j] + 1 } else { 0 };
            let k = curr[j + 1];
            if k > best_len {
                best_i = i + 1 - k;
                best_j = j + 1 - k;
                best_len = k;
            }
        }
        std::mem::swap(&mut prev, &mut curr);
        curr.iter_mut().for_each(|v| *v = 0);
    }

    (best_i, best_j, best_len)
}

/// The default [`NameMatcher`]: [`similarity`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceMatcher;

impl NameMatcher for SequenceMatcher {
    fn name(&self) -> &str {
        "sequence"
    }

    fn similarity(&self, a: &str, b: &str) -> f64 {
        similarity(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn case_and_whitespace_insensitive_exact_match() {
        assert_eq!(similarity("Alice", "alice"), 1.0);
        assert_eq!(similarity("  Alice   Smith ", "alice smith"), 1.0);
    }

    #[test]
    fn identical_names_score_one() {
        for name in ["", "x", "Jonathan Smith", "Zoë O'Neil"] {
            assert_eq!(similarity(name, name), 1.0, "{name:?}");
        }
    }

    #[test]
    fn substring_scores_fixed_value() {
        assert_eq!(similarity("Jon", "Jonathan Smith"), SUBSTRING_SIMILARITY);
        assert_eq!(similarity("Jonathan Smith", "jon"), SUBSTRING_SIMILARITY);
    }

    #[test]
    fn blank_never_matches_a_name() {
        assert_eq!(similarity("", "Alice"), 0.0);
        assert_eq!(similarity("Alice", "   "), 0.0);
    }

    #[test]
    fn sequence_ratio_reference_values() {
        assert!(close(similarity("Alice Smith", "Alise Smith"), 20.0 / 22.0));
        assert!(close(similarity("Catherine", "Katherine"), 16.0 / 18.0));
        assert!(close(similarity("John Doe", "Jon Doe"), 14.0 / 15.0));
        assert!(close(similarity("Maria", "Mario"), 0.8));
        assert!(close(similarity("Bob", "Rob"), 4.0 / 6.0));
        assert!(close(similarity("Liam", "Noah"), 0.25));
        assert_eq!(similarity("Alice", "Bob"), 0.0);
    }

    #[test]
    fn distinct_names_stay_below_one() {
        let score = similarity("Jonathan Smith", "Jon Smyth");
        assert!(score > 0.6 && score < 1.0, "got {score}");
    }

    #[test]
    fn matcher_trait_delegates() {
        let matcher = SequenceMatcher;
        assert_eq!(matcher.name(), "sequence");
        assert_eq!(matcher.similarity("Ann Lee", "ann lee"), 1.0);
    }
}
