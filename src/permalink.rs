//! Permalink grammar: `https://<host>/<org>/<repo>/blob/<revision>/<path>#L<start>(-L<end>)?`.

use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::types::LinkReference;

/// Compiled permalink pattern. Groups: host, org, repo, revision, path, start, end.
#[allow(clippy::expect_used, reason = "hardcoded pattern is a compile-time invariant")]
static PERMALINK: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(
        r#"https://([^/\s]+)/([^/\s]+)/([^/\s]+)/blob/([^/\s#]+)/([^#\s)\]>"'`]+)#L(\d+)(?:-L(\d+))?"#,
    )
    .expect("valid permalink regex");
});

/// Revision tokens made only of 7 to 40 hex digits are commit hashes.
#[allow(clippy::expect_used, reason = "hardcoded pattern is a compile-time invariant")]
static COMMIT_HASH: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"^[0-9a-fA-F]{7,40}$").expect("valid commit hash regex");
});

/// True when a revision token is a raw commit hash rather than a symbolic tag.
pub fn is_commit_hash(revision: &str) -> bool {
    return COMMIT_HASH.is_match(revision);
}

/// Find every permalink on one document line, with its byte span in that line.
pub fn find_in_line(
    line: &str,
    document: &Path,
    line_number: usize,
) -> Vec<(Range<usize>, LinkReference)> {
    return PERMALINK
        .captures_iter(line)
        .filter_map(|cap| {
            let span = cap.get(0)?.range();
            let link = link_from_captures(&cap, document, line_number)?;
            return Some((span, link));
        })
        .collect();
}

/// Render a permalink for `link` at a new revision and range.
/// A single-line range omits the `-L<end>` suffix.
pub fn format(link: &LinkReference, revision: &str, start: usize, end: usize) -> String {
    let prefix = format!(
        "https://{}/{}/{}/blob/{revision}/{}#L{start}",
        link.host, link.org, link.repo, link.path
    );
    if start == end {
        return prefix;
    }
    return format!("{prefix}-L{end}");
}

/// Build a reference from a single regex capture.
/// Line numbers too large for `usize` saturate, so the resolver sees them as an invalid range.
fn link_from_captures(
    cap: &Captures<'_>,
    document: &Path,
    line_number: usize,
) -> Option<LinkReference> {
    let start_line = parse_line_number(cap.get(6)?.as_str());
    let end_line = cap.get(7).map_or(start_line, |m| return parse_line_number(m.as_str()));

    return Some(LinkReference {
        end_line,
        host: cap.get(1)?.as_str().to_string(),
        line_number_in_document: line_number,
        old_revision: cap.get(4)?.as_str().to_string(),
        org: cap.get(2)?.as_str().to_string(),
        path: cap.get(5)?.as_str().to_string(),
        raw_text: cap.get(0)?.as_str().to_string(),
        repo: cap.get(3)?.as_str().to_string(),
        source_document: document.to_path_buf(),
        start_line,
    });
}

/// Digits captured after `L`. Only overflow can fail, so it maps to `usize::MAX`.
fn parse_line_number(digits: &str) -> usize {
    return digits.parse().unwrap_or(usize::MAX);
}

/// Check whether a link points into the configured `host/org/repo`.
/// The filter may carry a scheme or a trailing slash; comparison ignores case.
pub fn matches_repository(link: &LinkReference, filter: &str) -> bool {
    let wanted = filter
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .trim_end_matches(".git");
    let actual = format!("{}/{}/{}", link.host, link.org, link.repo);
    return actual.eq_ignore_ascii_case(wanted);
}

/// Parse a standalone permalink string, e.g. one passed on the command line.
/// The whole input must be a single permalink.
pub fn parse(url: &str) -> Option<LinkReference> {
    let trimmed = url.trim();
    let cap = PERMALINK.captures(trimmed)?;
    if cap.get(0)?.range() != (0..trimmed.len()) {
        return None;
    }
    return link_from_captures(&cap, Path::new("<command line>"), 0);
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used, clippy::indexing_slicing, reason = "tests")]
mod tests {
    use super::*;

    const RANGE_URL: &str =
        "https://github.com/cosmos/cosmos-sdk/blob/v0.47.0/x/bank/keeper/send.go#L10-L12";

    #[test]
    fn parses_range_link() {
        let link = parse(RANGE_URL).unwrap();
        assert_eq!(link.host, "github.com");
        assert_eq!(link.org, "cosmos");
        assert_eq!(link.repo, "cosmos-sdk");
        assert_eq!(link.old_revision, "v0.47.0");
        assert_eq!(link.path, "x/bank/keeper/send.go");
        assert_eq!((link.start_line, link.end_line), (10, 12));
    }

    #[test]
    fn single_line_link_defaults_end_to_start() {
        let link = parse("https://github.com/o/r/blob/v1/a.go#L7").unwrap();
        assert_eq!((link.start_line, link.end_line), (7, 7));
        assert_eq!(format(&link, "v2", 7, 7), "https://github.com/o/r/blob/v2/a.go#L7");
    }

    #[test]
    fn formats_range_with_new_revision() {
        let link = parse(RANGE_URL).unwrap();
        assert_eq!(
            format(&link, "v0.50.0", 15, 17),
            "https://github.com/cosmos/cosmos-sdk/blob/v0.50.0/x/bank/keeper/send.go#L15-L17"
        );
    }

    #[test]
    fn finds_links_inside_markdown() {
        let line = format!("See [send]({RANGE_URL}) and <https://github.com/o/r/blob/v1/b.rs#L3>.");
        let found = find_in_line(&line, Path::new("docs/a.md"), 4);
        assert_eq!(found.len(), 2);
        let (span, link) = &found[0];
        assert_eq!(&line[span.clone()], RANGE_URL);
        assert_eq!(link.line_number_in_document, 4);
        assert_eq!(found[1].1.path, "b.rs");
    }

    #[test]
    fn ignores_links_without_line_anchor() {
        let found = find_in_line("https://github.com/o/r/blob/v1/a.go", Path::new("a.md"), 1);
        assert!(found.is_empty());
    }

    #[test]
    fn detects_commit_hashes() {
        assert!(is_commit_hash("0123456789abcdef0123456789abcdef01234567"));
        assert!(is_commit_hash("deadbee"));
        assert!(!is_commit_hash("v0.50.0"));
        assert!(!is_commit_hash("main"));
        assert!(!is_commit_hash("abc12"));
    }

    #[test]
    fn repository_filter_ignores_scheme_and_case() {
        let link = parse(RANGE_URL).unwrap();
        assert!(matches_repository(&link, "github.com/cosmos/cosmos-sdk"));
        assert!(matches_repository(&link, "https://github.com/Cosmos/cosmos-sdk/"));
        assert!(!matches_repository(&link, "github.com/cosmos/gaia"));
    }

    #[test]
    fn parse_rejects_surrounding_text() {
        assert!(parse(&format!("see {RANGE_URL}")).is_none());
    }

    #[test]
    fn oversized_line_numbers_are_kept() {
        let url = "https://github.com/o/r/blob/v1/a.go#L5-L99999999999999999999999";
        let links = find_in_line(url, Path::new("a.md"), 1);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].1.start_line, 5);
        assert_eq!(links[0].1.end_line, usize::MAX);
    }
}
