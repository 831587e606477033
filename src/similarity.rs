//! Pluggable text-similarity strategies used by the fuzzy aligner.

use std::collections::HashMap;

use similar::{Algorithm, TextDiff};

/// Scores how alike two normalized texts are, from 0.0 (unrelated) to 1.0 (identical).
pub trait SimilarityScorer: Send + Sync {
    /// Similarity of `a` and `b` in `[0, 1]`. Must be deterministic.
    fn score(&self, a: &str, b: &str) -> f64;

    /// A cheap ceiling on `score(a, b)`, if this scorer has one.
    /// Candidates whose ceiling cannot beat the current best are skipped.
    fn upper_bound(&self, _a: &str, _b: &str) -> Option<f64> {
        return None;
    }
}

/// Selects a scorer from configuration or the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ScorerKind {
    /// Character-level matching ratio, `2·M/T`.
    #[default]
    CharRatio,
    /// Normalized Levenshtein distance.
    Levenshtein,
    /// Word-level matching ratio.
    TokenRatio,
}

impl ScorerKind {
    /// Instantiate the selected strategy.
    pub fn build(self) -> Box<dyn SimilarityScorer> {
        return match self {
            Self::CharRatio => Box::new(CharRatio),
            Self::Levenshtein => Box::new(Levenshtein),
            Self::TokenRatio => Box::new(TokenRatio),
        };
    }

    /// Name as written in config files.
    pub const fn name(self) -> &'static str {
        return match self {
            Self::CharRatio => "char-ratio",
            Self::Levenshtein => "levenshtein",
            Self::TokenRatio => "token-ratio",
        };
    }
}

/// Bits per word of the bit-parallel LCS rows.
const WORD_BITS: usize = 64;

/// Character-level ratio `2·M/T`, where `M` is the longest common subsequence
/// of characters. Equal to the ratio of an optimal character diff.
pub struct CharRatio;

impl SimilarityScorer for CharRatio {
    fn score(&self, a: &str, b: &str) -> f64 {
        let total = a.chars().count().saturating_add(b.chars().count());
        if total == 0 {
            return 1.0;
        }
        return 2.0 * count_as_f64(common_subsequence_len(a, b)) / count_as_f64(total);
    }

    /// Shared characters counted as multisets, ignoring order.
    fn upper_bound(&self, a: &str, b: &str) -> Option<f64> {
        let total = a.chars().count().saturating_add(b.chars().count());
        if total == 0 {
            return Some(1.0);
        }
        return Some(2.0 * count_as_f64(shared_chars(a, b)) / count_as_f64(total));
    }
}

/// One minus the Levenshtein distance over the longer length.
pub struct Levenshtein;

impl SimilarityScorer for Levenshtein {
    fn score(&self, a: &str, b: &str) -> f64 {
        return strsim::normalized_levenshtein(a, b);
    }

    fn upper_bound(&self, a: &str, b: &str) -> Option<f64> {
        let (la, lb) = (a.chars().count(), b.chars().count());
        let longest = la.max(lb);
        if longest == 0 {
            return Some(1.0);
        }
        return Some(count_as_f64(la.min(lb)) / count_as_f64(longest));
    }
}

/// Word-level ratio over whitespace-separated tokens.
/// Whitespace itself never counts as a match.
pub struct TokenRatio;

impl SimilarityScorer for TokenRatio {
    fn score(&self, a: &str, b: &str) -> f64 {
        let left: Vec<&str> = a.split_whitespace().collect();
        let right: Vec<&str> = b.split_whitespace().collect();
        let diff = TextDiff::configure().algorithm(Algorithm::Myers).diff_slices(&left, &right);
        return f64::from(diff.ratio());
    }

    fn upper_bound(&self, a: &str, b: &str) -> Option<f64> {
        let (la, lb) = (a.split_whitespace().count(), b.split_whitespace().count());
        let total = la.saturating_add(lb);
        if total == 0 {
            return Some(1.0);
        }
        return Some(2.0 * count_as_f64(la.min(lb)) / count_as_f64(total));
    }
}

/// Length of the longest common subsequence of the characters of `a` and `b`.
///
/// Bit-parallel row update (Allison and Dix, in Hyyrö's form): the match
/// positions of each character of `a` are packed into `u64` words and every
/// character of `b` advances the whole row at once, O(|a|·|b|/64).
/// Zero bits of the final row count the matched characters.
fn common_subsequence_len(a: &str, b: &str) -> usize {
    let pattern: Vec<char> = a.chars().collect();
    if pattern.is_empty() {
        return 0;
    }
    let words = pattern.len().div_ceil(WORD_BITS);

    let mut masks: HashMap<char, Vec<u64>> = HashMap::new();
    for (i, c) in pattern.iter().enumerate() {
        let mask = masks.entry(*c).or_insert_with(|| return vec![0; words]);
        let bit = u32::try_from(i % WORD_BITS).unwrap_or(0);
        if let Some(word) = mask.get_mut(i / WORD_BITS) {
            *word |= 1_u64.rotate_left(bit);
        }
    }

    let mut row = vec![u64::MAX; words];
    for c in b.chars() {
        let Some(mask) = masks.get(&c) else {
            continue;
        };
        let mut carry = 0_u64;
        for (v, &m) in row.iter_mut().zip(mask) {
            let (sum, first) = v.overflowing_add(*v & m);
            let (sum, second) = sum.overflowing_add(carry);
            carry = u64::from(first || second);
            *v = sum | (*v & !m);
        }
    }

    // Padding bits past the pattern stay set, so they never count.
    let zeros: u32 = row.iter().map(|w| return w.count_zeros()).sum();
    return usize::try_from(zeros).unwrap_or(usize::MAX);
}

/// Characters `a` and `b` have in common, counted with multiplicity.
fn shared_chars(a: &str, b: &str) -> usize {
    let mut available: HashMap<char, usize> = HashMap::new();
    for c in a.chars() {
        let n = available.entry(c).or_insert(0);
        *n = n.saturating_add(1);
    }

    let mut shared = 0_usize;
    for c in b.chars() {
        if let Some(n) = available.get_mut(&c).filter(|n| return **n > 0) {
            *n = n.saturating_sub(1);
            shared = shared.saturating_add(1);
        }
    }
    return shared;
}

/// Lossless enough for line and character counts.
fn count_as_f64(n: usize) -> f64 {
    return f64::from(u32::try_from(n).unwrap_or(u32::MAX));
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "tests")]
mod tests {
    use super::*;

    const KINDS: [ScorerKind; 3] = [ScorerKind::CharRatio, ScorerKind::Levenshtein, ScorerKind::TokenRatio];

    #[test]
    fn identical_text_scores_one() {
        for kind in KINDS {
            let scorer = kind.build();
            let score = scorer.score("func Foo() {\nreturn 1\n}", "func Foo() {\nreturn 1\n}");
            assert!((score - 1.0).abs() < 1e-9, "{} scored {score}", kind.name());
        }
    }

    #[test]
    fn unrelated_text_scores_low() {
        for kind in KINDS {
            let scorer = kind.build();
            let score = scorer.score("aaaa aaaa", "zzzz zzzz");
            assert!(score < 0.3, "{} scored {score}", kind.name());
        }
    }

    #[test]
    fn token_ratio_ignores_shared_whitespace() {
        let a = "let total = compute(items, rate);\nif total > limit {";
        let b = "fn other_thing() -> bool {\nwhile x < y {";
        let score = TokenRatio.score(a, b);
        assert!(score < 0.3, "scored {score}");
        assert!((TokenRatio.score("a  b\nc", "a b c") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn char_ratio_agrees_with_an_optimal_diff() {
        let long_a = "fn compute(items: &[Item], rate: f64) -> f64 { items.iter().map(|i| i.price * rate).sum() }";
        let long_b = "pub fn compute(items: &[Item], rate: f32) -> f32 {\nitems.iter().map(|item| item.price * rate).sum()\n}";
        let (many_a, many_b) = (long_a.repeat(3), long_b.repeat(2));
        let pairs = [
            ("a\nb\nc", "a\nx\nc"),
            ("kitten", "sitting"),
            ("", "abc"),
            ("héllo wörld", "hello world"),
            (long_a, long_b),
            (many_a.as_str(), many_b.as_str()),
        ];
        for (a, b) in pairs {
            let expected = f64::from(TextDiff::configure().algorithm(Algorithm::Myers).diff_chars(a, b).ratio());
            let score = CharRatio.score(a, b);
            assert!((score - expected).abs() < 1e-6, "{a:?} vs {b:?}: {score} != {expected}");
        }
    }

    #[test]
    fn char_ratio_matches_difflib_ratio() {
        // difflib.SequenceMatcher(None, "a\nb\nc", "a\nx\nc").ratio() == 0.8
        let score = CharRatio.score("a\nb\nc", "a\nx\nc");
        assert!((score - 0.8).abs() < 1e-6, "scored {score}");
    }

    #[test]
    fn upper_bounds_hold() {
        let pairs = [
            ("a\nb\nc", "a\nx\nc"),
            ("short", "a much longer text"),
            ("", "x"),
            ("let x = compute(a, b);", "while y < limit { step(); }"),
        ];
        for (a, b) in pairs {
            for scorer in [&CharRatio as &dyn SimilarityScorer, &Levenshtein, &TokenRatio] {
                let bound = scorer.upper_bound(a, b).unwrap_or(1.0);
                assert!(scorer.score(a, b) <= bound + 1e-6, "bound violated for {a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn scorer_kind_reads_kebab_case() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            scorer: ScorerKind,
        }
        let parsed: Wrapper = toml::from_str("scorer = \"token-ratio\"").unwrap_or(Wrapper {
            scorer: ScorerKind::CharRatio,
        });
        assert_eq!(parsed.scorer, ScorerKind::TokenRatio);
    }
}
