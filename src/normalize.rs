//! Range extraction and whitespace normalization of snapshot lines.

use crate::types::{FileSnapshot, NormalizedSegment};

/// Collapse every run of whitespace to one space and trim both ends.
pub fn normalize_line(line: &str) -> String {
    return line.split_whitespace().collect::<Vec<_>>().join(" ");
}

/// Normalize every line of a slice.
pub fn normalize_lines(lines: &[String]) -> Vec<String> {
    return lines.iter().map(|l| return normalize_line(l)).collect();
}

/// Extract the 1-based inclusive range `start..=end` from a snapshot and normalize it.
///
/// Returns `None` when the snapshot is unavailable, `start` is zero,
/// `start > end`, or `end` lies past the last line.
pub fn extract(snapshot: &FileSnapshot, start: usize, end: usize) -> Option<NormalizedSegment> {
    let lines = snapshot.normalized()?;
    if start == 0 || start > end || end > lines.len() {
        return None;
    }
    let slice = lines.get(start.checked_sub(1)?..end)?;
    return Some(NormalizedSegment(slice.to_vec()));
}
