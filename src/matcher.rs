//! Exact matching: the old lines, in order, inside a bounded window of the new file.

use crate::types::NormalizedSegment;

/// Default number of extra lines a window may hold beyond the old segment (K).
pub const DEFAULT_WINDOW_SLACK: usize = 10;

/// Find the old segment as an order-preserving subsequence of a window of `new_lines`.
///
/// Windows hold between `old.len()` and `old.len() + slack` lines and are scanned
/// left to right. A window only counts when it opens on the segment's first line;
/// otherwise the same lines also match a tighter window further right. For each
/// start the earliest greedy match gives the smallest window.
///
/// `new_lines` must already be normalized. Returns the 1-based inclusive range of
/// the matching window, or `None` when no window up to the size cap matches.
pub fn find(old: &NormalizedSegment, new_lines: &[String], slack: usize) -> Option<(usize, usize)> {
    let first = old.0.first()?;
    let cap = old.len().saturating_add(slack);

    for (start, line) in new_lines.iter().enumerate() {
        if line != first {
            continue;
        }
        let limit = start.saturating_add(cap).min(new_lines.len());
        let Some(window) = new_lines.get(start..limit) else {
            continue;
        };
        if let Some(last) = subsequence_end(&old.0, window) {
            return Some((start.saturating_add(1), start.saturating_add(last).saturating_add(1)));
        }
    }

    return None;
}

/// Greedily match `needle` as a subsequence of `window`.
/// Returns the window index of the last matched line.
fn subsequence_end(needle: &[String], window: &[String]) -> Option<usize> {
    let mut remaining = needle.iter().peekable();
    for (idx, line) in window.iter().enumerate() {
        if remaining.peek() == Some(&line) {
            remaining.next();
            if remaining.peek().is_none() {
                return Some(idx);
            }
        }
    }
    return None;
}
