/// Core domain types for relink: permalinks, snapshots, and resolution outcomes.
use std::path::PathBuf;

use crate::normalize;

/// A line permalink found in a document by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReference {
    /// Last line of the referenced range. Equals `start_line` for single-line links.
    pub end_line: usize,
    /// Host part of the URL, e.g. `github.com`.
    pub host: String,
    /// One-based line number of the link in the source document.
    pub line_number_in_document: usize,
    /// Revision token the link is pinned to (tag, branch, or commit hash).
    pub old_revision: String,
    /// Owner or organisation segment of the URL.
    pub org: String,
    /// Repository-relative path of the referenced file. May contain `/`.
    pub path: String,
    /// The permalink exactly as written in the document.
    pub raw_text: String,
    /// Repository segment of the URL.
    pub repo: String,
    /// Document the link was found in.
    pub source_document: PathBuf,
    /// First line of the referenced range.
    pub start_line: usize,
}

/// Full line sequence of one file at one revision, with its whitespace-folded form.
/// Shared behind an `Arc` by the revision store; never mutated after fetch, so
/// every link into the same file reuses one normalization.
#[derive(Debug, PartialEq, Eq)]
pub enum FileSnapshot {
    /// The file exists at this revision.
    Available {
        /// Lines as stored in the repository.
        lines: Vec<String>,
        /// `lines` after [`normalize::normalize_line`], index for index.
        normalized: Vec<String>,
    },
    /// Missing at this revision, or the lookup failed or timed out.
    Unavailable,
}

impl FileSnapshot {
    /// Split raw file content into a snapshot of lines.
    pub fn from_content(content: &str) -> Self {
        return Self::from_lines(content.lines().map(String::from).collect());
    }

    /// Snapshot over already split lines.
    pub fn from_lines(lines: Vec<String>) -> Self {
        let normalized = normalize::normalize_lines(&lines);
        return Self::Available { lines, normalized };
    }

    /// Lines of the snapshot, or `None` when unavailable.
    pub fn lines(&self) -> Option<&[String]> {
        return match self {
            Self::Available { lines, .. } => Some(lines),
            Self::Unavailable => None,
        };
    }

    /// Normalized lines of the snapshot, or `None` when unavailable.
    pub fn normalized(&self) -> Option<&[String]> {
        return match self {
            Self::Available { normalized, .. } => Some(normalized),
            Self::Unavailable => None,
        };
    }
}

/// Whitespace-folded lines taken from a snapshot range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSegment(
    /// One normalized string per source line.
    pub Vec<String>,
);

impl NormalizedSegment {
    /// Number of lines in the segment.
    pub fn len(&self) -> usize {
        return self.0.len();
    }

    /// True when the segment holds no lines.
    pub fn is_empty(&self) -> bool {
        return self.0.is_empty();
    }
}

/// Why a link could not be re-anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureReason {
    /// The file is missing at the old or the target revision.
    FileUnavailable,
    /// The declared range lies outside the old file.
    InvalidRange,
    /// No window reached the similarity threshold.
    FuzzyMatchFailed,
}

/// Why a link was left alone without being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    /// The link already points at the target revision.
    AlreadyCurrent,
    /// The link is pinned to an exact commit rather than a moving tag.
    PinnedCommit,
}

/// Result of resolving one link.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    /// Not a stale link; left untouched and kept out of the report.
    Bypassed {
        /// Why resolution was skipped.
        reason: BypassReason,
    },
    /// The old lines were found in order within a bounded window.
    ResolvedExact {
        /// Last line of the new range.
        new_end: usize,
        /// First line of the new range.
        new_start: usize,
    },
    /// The best similarity window met the threshold.
    ResolvedFuzzy {
        /// Last line of the new range.
        new_end: usize,
        /// First line of the new range.
        new_start: usize,
        /// Similarity of the accepted window, in `[0, 1]`.
        score: f64,
    },
    /// The link could not be re-anchored.
    Unresolved {
        /// Failure classification.
        reason: FailureReason,
        /// Best similarity reached, when fuzzy matching ran.
        score: Option<f64>,
    },
}

impl ResolutionOutcome {
    /// The new `(start, end)` range for resolved outcomes.
    pub fn new_range(&self) -> Option<(usize, usize)> {
        return match *self {
            Self::ResolvedExact { new_start, new_end }
            | Self::ResolvedFuzzy { new_start, new_end, .. } => Some((new_start, new_end)),
            Self::Bypassed { .. } | Self::Unresolved { .. } => None,
        };
    }
}

/// A document of the corpus and its full text.
#[derive(Debug, Clone)]
pub struct Document {
    /// Full text content as read from disk.
    pub content: String,
    /// Path of the document on disk.
    pub path: PathBuf,
}
