//! Fuzzy fallback: slide windows near the old segment's size and keep the most similar one.

use crate::similarity::SimilarityScorer;
use crate::types::NormalizedSegment;

/// Default spread of candidate window sizes around the old segment length.
pub const DEFAULT_SPREAD: usize = 2;

/// Outcome of aligning one segment against a file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Alignment {
    /// The best window reached the threshold.
    Accepted {
        /// Last line of the window, 1-based inclusive.
        end: usize,
        /// Similarity of the window.
        score: f64,
        /// First line of the window, 1-based.
        start: usize,
    },
    /// No window reached the threshold.
    Rejected {
        /// Best score seen, or `None` when no window could be formed.
        best_score: Option<f64>,
    },
}

/// Best candidate seen so far: 0-based start, size, score.
#[derive(Clone, Copy)]
struct Candidate {
    /// Similarity of the window.
    score: f64,
    /// Window length in lines.
    size: usize,
    /// 0-based index of the first window line.
    start: usize,
}

/// Align `old` against normalized `new_lines`.
///
/// Window sizes run from `old.len() - spread` (at least 1) to `old.len() + spread`;
/// each size slides across the whole file. Old and window lines are joined with
/// `\n` before scoring. Ties keep the first candidate in scan order (smaller size,
/// then leftmost), so repeated runs give identical results.
pub fn align(
    old: &NormalizedSegment,
    new_lines: &[String],
    threshold: f64,
    spread: usize,
    scorer: &dyn SimilarityScorer,
) -> Alignment {
    let Some(best) = best_window(old, new_lines, spread, scorer) else {
        return Alignment::Rejected { best_score: None };
    };

    if best.score < threshold {
        return Alignment::Rejected { best_score: Some(best.score) };
    }

    return Alignment::Accepted {
        end: best.start.saturating_add(best.size),
        score: best.score,
        start: best.start.saturating_add(1),
    };
}

/// Scan every candidate window and return the highest-scoring one.
fn best_window(
    old: &NormalizedSegment,
    new_lines: &[String],
    spread: usize,
    scorer: &dyn SimilarityScorer,
) -> Option<Candidate> {
    if old.is_empty() || new_lines.is_empty() {
        return None;
    }

    let needle = old.0.join("\n");
    let smallest = old.len().saturating_sub(spread).max(1);
    let largest = old.len().saturating_add(spread).min(new_lines.len());
    let mut best: Option<Candidate> = None;

    for size in smallest..=largest {
        for (start, window) in new_lines.windows(size).enumerate() {
            let haystack = window.join("\n");
            if cannot_beat(scorer, &needle, &haystack, best) {
                continue;
            }
            let score = scorer.score(&needle, &haystack);
            if best.is_none_or(|b| return score > b.score) {
                best = Some(Candidate { score, size, start });
            }
        }
    }

    return best;
}

/// True when the scorer's ceiling for this pair is no better than the current best.
fn cannot_beat(
    scorer: &dyn SimilarityScorer,
    needle: &str,
    haystack: &str,
    best: Option<Candidate>,
) -> bool {
    let Some(current) = best else {
        return false;
    };
    return scorer
        .upper_bound(needle, haystack)
        .is_some_and(|bound| return bound <= current.score);
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used, reason = "tests")]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::similarity::{CharRatio, Levenshtein, TokenRatio};

    /// `CharRatio` without its upper bound, so every window is scored.
    struct Unbounded;

    impl SimilarityScorer for Unbounded {
        fn score(&self, a: &str, b: &str) -> f64 {
            return CharRatio.score(a, b);
        }
    }

    fn segment(lines: &[&str]) -> NormalizedSegment {
        return NormalizedSegment(lines.iter().map(|l| return (*l).to_string()).collect());
    }

    fn lines(lines: &[&str]) -> Vec<String> {
        return lines.iter().map(|l| return (*l).to_string()).collect();
    }

    #[test]
    fn accepts_close_window_above_threshold() {
        let old = segment(&["a", "b", "c"]);
        let new = lines(&["zzz", "qqq", "a", "x", "c", "yyy"]);
        let Alignment::Accepted { start, end, score } = align(&old, &new, 0.7, DEFAULT_SPREAD, &CharRatio)
        else {
            panic!("expected a fuzzy match");
        };
        assert_eq!((start, end), (3, 5));
        assert!((0.7..0.85).contains(&score), "score {score}");
    }

    #[test]
    fn rejection_carries_best_score() {
        let old = segment(&["a", "b", "c"]);
        let new = lines(&["zzz", "qqq", "a", "x", "c", "yyy"]);
        let Alignment::Rejected { best_score } = align(&old, &new, 0.95, DEFAULT_SPREAD, &CharRatio) else {
            panic!("expected rejection");
        };
        let best = best_score.unwrap();
        assert!((0.7..0.95).contains(&best), "best {best}");
    }

    #[test]
    fn is_idempotent() {
        let old = segment(&["fn total(items: &[Item]) -> u64 {", "items.iter().map(|i| i.price).sum()", "}"]);
        let new = lines(&[
            "use crate::Item;",
            "",
            "pub fn total(items: &[Item]) -> u64 {",
            "items.iter().map(|item| item.price).sum()",
            "}",
            "",
            "fn other() {}",
        ]);
        for scorer in [&CharRatio as &dyn SimilarityScorer, &Levenshtein, &TokenRatio] {
            let first = align(&old, &new, 0.5, DEFAULT_SPREAD, scorer);
            let second = align(&old, &new, 0.5, DEFAULT_SPREAD, scorer);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn pruning_does_not_change_the_winner() {
        let old = segment(&["let x = compute(a, b);", "if x > 3 {", "retry();", "}"]);
        let new = lines(&[
            "// header",
            "let y = 0;",
            "let x = compute(a, b, c);",
            "if x > 4 {",
            "retry_later();",
            "}",
            "done();",
        ]);
        assert_eq!(
            align(&old, &new, 0.0, DEFAULT_SPREAD, &CharRatio),
            align(&old, &new, 0.0, DEFAULT_SPREAD, &Unbounded)
        );
    }

    #[test]
    fn window_sizes_never_drop_below_one() {
        let old = segment(&["only"]);
        let new = lines(&["other", "only"]);
        let result = align(&old, &new, 0.9, DEFAULT_SPREAD, &CharRatio);
        assert_eq!(result, Alignment::Accepted { end: 2, score: 1.0, start: 2 });
    }

    #[test]
    fn empty_target_has_no_score() {
        let result = align(&segment(&["a"]), &[], 0.5, DEFAULT_SPREAD, &CharRatio);
        assert_eq!(result, Alignment::Rejected { best_score: None });
    }

    #[test]
    fn large_unrelated_target_is_scanned_quickly() {
        let old = NormalizedSegment(
            (0..20)
                .map(|i| return format!("let total_{i} = compute(items, rate_{i});"))
                .collect(),
        );
        let new: Vec<String> = (0..1500)
            .map(|i| return format!("fn other_thing_{i}() -> bool {{ while x < y {{ step({i}); }} }}"))
            .collect();

        let started = Instant::now();
        let pruned = align(&old, &new, 0.8, DEFAULT_SPREAD, &CharRatio);
        let elapsed = started.elapsed();
        assert!(elapsed < Duration::from_secs(30), "took {elapsed:?}");

        let Alignment::Rejected { best_score: Some(best) } = pruned else {
            panic!("expected rejection with a score, got {pruned:?}");
        };
        assert!(best < 0.8, "best {best}");
        assert_eq!(pruned, align(&old, &new, 0.8, DEFAULT_SPREAD, &Unbounded));
    }
}
