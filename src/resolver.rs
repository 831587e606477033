//! Per-link resolution: bypass check, snapshots, range extraction, exact then fuzzy matching.

use tracing::{debug, trace};

use crate::config::Config;
use crate::error::Error;
use crate::fuzzy::{self, Alignment};
use crate::matcher;
use crate::normalize;
use crate::permalink;
use crate::similarity::SimilarityScorer;
use crate::store::{RevisionStore, SnapshotKey};
use crate::types::{BypassReason, FailureReason, LinkReference, ResolutionOutcome};

/// The subset of configuration the resolver needs.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Spread of fuzzy window sizes around the old range length.
    pub fuzzy_spread: usize,
    /// Minimum accepted fuzzy score.
    pub fuzzy_threshold: f64,
    /// Revision links are migrated toward.
    pub target_revision: String,
    /// Extra lines allowed in an exact-match window.
    pub window_slack: usize,
}

impl ResolverSettings {
    /// Take resolver settings from a validated config.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingTargetRevision` when no target is configured.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        return Ok(Self {
            fuzzy_spread: config.fuzzy_spread,
            fuzzy_threshold: config.fuzzy_threshold,
            target_revision: config.require_target()?.to_string(),
            window_slack: config.window_slack,
        });
    }
}

/// Resolves links against a shared revision store.
pub struct LinkResolver<'a> {
    /// Similarity strategy for the fuzzy fallback.
    scorer: &'a dyn SimilarityScorer,
    /// Thresholds and target revision.
    settings: &'a ResolverSettings,
    /// Snapshot cache.
    store: &'a RevisionStore,
}

impl<'a> LinkResolver<'a> {
    /// Resolver over `store` using `scorer` for fuzzy matching.
    pub const fn new(
        store: &'a RevisionStore,
        scorer: &'a dyn SimilarityScorer,
        settings: &'a ResolverSettings,
    ) -> Self {
        return Self { scorer, settings, store };
    }

    /// Why a link should be left alone, if it should.
    pub fn bypass_reason(&self, link: &LinkReference) -> Option<BypassReason> {
        if link.old_revision == self.settings.target_revision {
            return Some(BypassReason::AlreadyCurrent);
        }
        if permalink::is_commit_hash(&link.old_revision) {
            return Some(BypassReason::PinnedCommit);
        }
        return None;
    }

    /// Resolve one link. Never fails; every problem becomes an `Unresolved` outcome.
    pub fn resolve(&self, link: &LinkReference) -> ResolutionOutcome {
        if let Some(reason) = self.bypass_reason(link) {
            trace!(url = %link.raw_text, ?reason, "bypassed");
            return ResolutionOutcome::Bypassed { reason };
        }

        let target = self.settings.target_revision.as_str();
        let old = self.store.fetch(&link.old_revision, &link.path);
        let new = self.store.fetch(target, &link.path);
        let (Some(_), Some(new_normalized)) = (old.lines(), new.normalized()) else {
            debug!(url = %link.raw_text, "file unavailable at one end");
            return unresolved(FailureReason::FileUnavailable, None);
        };

        let Some(segment) = normalize::extract(&old, link.start_line, link.end_line) else {
            debug!(url = %link.raw_text, "declared range outside old file");
            return unresolved(FailureReason::InvalidRange, None);
        };

        if let Some((new_start, new_end)) =
            matcher::find(&segment, new_normalized, self.settings.window_slack)
        {
            debug!(url = %link.raw_text, new_start, new_end, "exact match");
            return ResolutionOutcome::ResolvedExact { new_end, new_start };
        }

        trace!(url = %link.raw_text, "no exact window, trying fuzzy alignment");
        return match fuzzy::align(
            &segment,
            new_normalized,
            self.settings.fuzzy_threshold,
            self.settings.fuzzy_spread,
            self.scorer,
        ) {
            Alignment::Accepted { start, end, score } => {
                debug!(url = %link.raw_text, start, end, score, "fuzzy match");
                ResolutionOutcome::ResolvedFuzzy { new_end: end, new_start: start, score }
            },
            Alignment::Rejected { best_score } => {
                debug!(url = %link.raw_text, ?best_score, "fuzzy match below threshold");
                unresolved(FailureReason::FuzzyMatchFailed, best_score)
            },
        };
    }

    /// Snapshot keys a link will need, or nothing for bypassed links.
    pub fn snapshot_keys(&self, link: &LinkReference) -> Vec<SnapshotKey> {
        if self.bypass_reason(link).is_some() {
            return Vec::new();
        }
        return vec![
            (link.old_revision.clone(), link.path.clone()),
            (self.settings.target_revision.clone(), link.path.clone()),
        ];
    }
}

/// Shorthand for an `Unresolved` outcome.
const fn unresolved(reason: FailureReason, score: Option<f64>) -> ResolutionOutcome {
    return ResolutionOutcome::Unresolved { reason, score };
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used, reason = "tests")]
mod tests {
    use super::*;
    use crate::similarity::CharRatio;
    use crate::store::testing::MemorySource;

    const TARGET: &str = "v2";

    fn settings(threshold: f64) -> ResolverSettings {
        return ResolverSettings {
            fuzzy_spread: fuzzy::DEFAULT_SPREAD,
            fuzzy_threshold: threshold,
            target_revision: TARGET.to_string(),
            window_slack: matcher::DEFAULT_WINDOW_SLACK,
        };
    }

    fn link(revision: &str, path: &str, start: usize, end: usize) -> LinkReference {
        let url = format!("https://github.com/o/r/blob/{revision}/{path}#L{start}-L{end}");
        return permalink::parse(&url).unwrap();
    }

    fn resolve_with(source: MemorySource, threshold: f64, link: &LinkReference) -> ResolutionOutcome {
        let store = RevisionStore::new(Box::new(source));
        let settings = settings(threshold);
        let resolver = LinkResolver::new(&store, &CharRatio, &settings);
        return resolver.resolve(link);
    }

    /// `prefix` filler lines, then `body`, then a trailer.
    fn padded(prefix: usize, body: &[&str]) -> Vec<String> {
        let mut lines: Vec<String> = (1..=prefix).map(|i| return format!("// filler {i}")).collect();
        lines.extend(body.iter().map(|l| return (*l).to_string()));
        lines.push("// end".to_string());
        return lines;
    }

    fn as_refs(lines: &[String]) -> Vec<&str> {
        return lines.iter().map(String::as_str).collect();
    }

    #[test]
    fn moved_block_resolves_exact() {
        let body = ["func Foo() {", "  return 1", "}"];
        let old = padded(9, &body);
        let new = padded(14, &body);
        let source = MemorySource::default()
            .with_file("v1", "foo.go", &as_refs(&old))
            .with_file(TARGET, "foo.go", &as_refs(&new));

        let outcome = resolve_with(source, 0.8, &link("v1", "foo.go", 10, 12));
        assert_eq!(outcome, ResolutionOutcome::ResolvedExact { new_end: 17, new_start: 15 });
    }

    #[test]
    fn reformatted_block_still_resolves_exact() {
        let source = MemorySource::default()
            .with_file("v1", "a.go", &["if x {", "\treturn  y", "}"])
            .with_file(TARGET, "a.go", &["// new header", "if x {", "    return y", "}"]);
        let outcome = resolve_with(source, 0.8, &link("v1", "a.go", 1, 3));
        assert_eq!(outcome, ResolutionOutcome::ResolvedExact { new_end: 4, new_start: 2 });
    }

    #[test]
    fn edited_block_resolves_fuzzy() {
        let source = MemorySource::default()
            .with_file("v1", "abc.txt", &["a", "b", "c"])
            .with_file(TARGET, "abc.txt", &["zzz", "qqq", "a", "x", "c", "yyy"]);

        let outcome = resolve_with(source, 0.7, &link("v1", "abc.txt", 1, 3));
        let ResolutionOutcome::ResolvedFuzzy { new_start, new_end, score } = outcome else {
            panic!("expected fuzzy resolution, got {outcome:?}");
        };
        assert_eq!((new_start, new_end), (3, 5));
        assert!((0.7..0.85).contains(&score), "score {score}");
    }

    #[test]
    fn fuzzy_miss_reports_best_score() {
        let source = MemorySource::default()
            .with_file("v1", "abc.txt", &["a", "b", "c"])
            .with_file(TARGET, "abc.txt", &["zzz", "qqq", "a", "x", "c", "yyy"]);

        let outcome = resolve_with(source, 0.95, &link("v1", "abc.txt", 1, 3));
        let ResolutionOutcome::Unresolved { reason, score } = outcome else {
            panic!("expected unresolved, got {outcome:?}");
        };
        assert_eq!(reason, FailureReason::FuzzyMatchFailed);
        assert!(score.is_some());
    }

    #[test]
    fn range_past_end_is_invalid() {
        let lines: Vec<String> = (1..=100).map(|i| return format!("line {i}")).collect();
        let source = MemorySource::default()
            .with_file("v1", "big.go", &as_refs(&lines))
            .with_file(TARGET, "big.go", &as_refs(&lines));

        let outcome = resolve_with(source, 0.8, &link("v1", "big.go", 490, 500));
        assert_eq!(outcome, unresolved(FailureReason::InvalidRange, None));
    }

    #[test]
    fn overflowing_line_number_is_invalid() {
        let source = MemorySource::default()
            .with_file("v1", "a.go", &["x"])
            .with_file(TARGET, "a.go", &["x"]);
        let url = "https://github.com/o/r/blob/v1/a.go#L99999999999999999999999";
        let parsed = permalink::parse(url).unwrap();
        assert_eq!(parsed.start_line, usize::MAX);

        let outcome = resolve_with(source, 0.8, &parsed);
        assert_eq!(outcome, unresolved(FailureReason::InvalidRange, None));
    }

    #[test]
    fn missing_file_at_either_end_is_unavailable() {
        let only_old = MemorySource::default().with_file("v1", "a.go", &["x"]);
        let outcome = resolve_with(only_old, 0.8, &link("v1", "a.go", 1, 1));
        assert_eq!(outcome, unresolved(FailureReason::FileUnavailable, None));

        let only_new = MemorySource::default().with_file(TARGET, "a.go", &["x"]);
        let outcome = resolve_with(only_new, 0.8, &link("v1", "a.go", 1, 1));
        assert_eq!(outcome, unresolved(FailureReason::FileUnavailable, None));
    }

    #[test]
    fn current_link_is_bypassed_without_fetching() {
        let source = MemorySource::default();
        let calls = std::sync::Arc::clone(&source.calls);
        let outcome = resolve_with(source, 0.8, &link(TARGET, "a.go", 1, 2));
        assert_eq!(outcome, ResolutionOutcome::Bypassed { reason: BypassReason::AlreadyCurrent });
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn commit_pinned_link_is_bypassed() {
        let hash = "0123456789abcdef0123456789abcdef01234567";
        let outcome = resolve_with(MemorySource::default(), 0.8, &link(hash, "a.go", 1, 2));
        assert_eq!(outcome, ResolutionOutcome::Bypassed { reason: BypassReason::PinnedCommit });
    }
}
