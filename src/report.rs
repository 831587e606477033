//! Run report: sorted outcome log, failure categories with fix hints, final counts.

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Error;
use crate::rewriter::LinkResult;
use crate::types::{FailureReason, ResolutionOutcome};

/// Report category for a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum FailureCategory {
    /// Declared range outside the old file.
    InvalidRange,
    /// File missing at one end, or the fetch failed.
    FileUnavailable,
    /// No window met the similarity threshold.
    FuzzyMatchFailed,
    /// Anything else, such as a document that could not be read or written.
    Other,
}

impl FailureCategory {
    /// Every category, in table order.
    pub const ALL: [Self; 4] = [Self::InvalidRange, Self::FileUnavailable, Self::FuzzyMatchFailed, Self::Other];

    /// What to do about failures in this category.
    pub const fn hint(self) -> &'static str {
        return match self {
            Self::InvalidRange => "the link points past the end of the file at its own revision; fix the line numbers by hand",
            Self::FileUnavailable => "the file was moved or deleted, or the revision is unknown locally; check `git fetch --tags` and update the path",
            Self::FuzzyMatchFailed => "the code was rewritten; inspect the link, or lower `fuzzy_threshold` if the best score is a near miss",
            Self::Other => "a document could not be read or written; check permissions and encoding",
        };
    }
}

impl From<FailureReason> for FailureCategory {
    fn from(reason: FailureReason) -> Self {
        return match reason {
            FailureReason::FileUnavailable => Self::FileUnavailable,
            FailureReason::FuzzyMatchFailed => Self::FuzzyMatchFailed,
            FailureReason::InvalidRange => Self::InvalidRange,
        };
    }
}

/// How an entry ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Re-anchored by exact window matching.
    Exact,
    /// Re-anchored by fuzzy alignment.
    Fuzzy,
    /// Left as written because of a failure.
    Unresolved,
}

/// One line of the outcome log.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    /// Failure category, for unresolved entries.
    pub category: Option<FailureCategory>,
    /// Extra context, e.g. the I/O error of a document failure.
    pub detail: Option<String>,
    /// Document containing the link.
    pub document: PathBuf,
    /// One-based line in the document; zero for whole-document failures.
    pub line: usize,
    /// Rewritten URL, for resolved entries.
    pub new_url: Option<String>,
    /// Similarity score; exact matches carry none.
    pub score: Option<f64>,
    /// Outcome.
    pub status: EntryStatus,
    /// The link as written; empty for whole-document failures.
    pub url: String,
}

impl ReportEntry {
    /// Sort score: exact counts as 1.0, unscored failures sort last.
    fn sort_score(&self) -> Option<f64> {
        return match self.status {
            EntryStatus::Exact => Some(1.0),
            EntryStatus::Fuzzy | EntryStatus::Unresolved => self.score,
        };
    }

    /// Failure log line: URL, document:line, reason, score.
    pub fn failure_line(&self) -> String {
        let category = self.category.map_or_else(|| return "-".to_string(), |c| return format!("{c:?}"));
        let url = if self.url.is_empty() { "-" } else { self.url.as_str() };
        let mut line = format!("{url}  {}:{}  {category}", self.document.display(), self.line);
        if let Some(score) = self.score {
            let _ = write!(line, "  best={score:.3}");
        }
        if let Some(detail) = &self.detail {
            let _ = write!(line, "  ({detail})");
        }
        return line;
    }
}

/// One row of the category table.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryRow {
    /// Category.
    pub category: FailureCategory,
    /// Number of failures in it.
    pub count: usize,
    /// Fix hint.
    pub hint: &'static str,
}

/// Final counts of a run.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct Counts {
    /// Links left alone because they were current or pinned to a commit.
    pub bypassed: usize,
    /// Documents whose text changed (or would have, in a dry run).
    pub documents_changed: usize,
    /// Documents scanned.
    pub documents_scanned: usize,
    /// Links re-anchored exactly.
    pub resolved_exact: usize,
    /// Links re-anchored fuzzily.
    pub resolved_fuzzy: usize,
    /// Links left unresolved.
    pub unresolved: usize,
}

/// Accumulates outcomes during a run.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    /// Running counts.
    counts: Counts,
    /// Non-bypassed entries, unsorted.
    entries: Vec<ReportEntry>,
}

impl ReportBuilder {
    /// Note that a document finished, and whether it changed.
    pub fn document_done(&mut self, changed: bool) {
        self.counts.documents_scanned = self.counts.documents_scanned.saturating_add(1);
        if changed {
            self.counts.documents_changed = self.counts.documents_changed.saturating_add(1);
        }
    }

    /// Sort the log and freeze the report.
    pub fn finish(self, dry_run: bool) -> Report {
        let mut entries = self.entries;
        entries.sort_by(compare_entries);
        return Report { counts: self.counts, dry_run, entries };
    }

    /// Record a whole-document failure under `Other`.
    pub fn record_document_error(&mut self, document: &Path, error: &Error) {
        self.entries.push(ReportEntry {
            category: Some(FailureCategory::Other),
            detail: Some(error.to_string()),
            document: document.to_path_buf(),
            line: 0,
            new_url: None,
            score: None,
            status: EntryStatus::Unresolved,
            url: String::new(),
        });
    }

    /// Record the outcome of one link occurrence. Bypassed links are only counted.
    pub fn record_link(&mut self, result: &LinkResult) {
        let (status, category, score) = match result.outcome {
            ResolutionOutcome::Bypassed { .. } => {
                self.counts.bypassed = self.counts.bypassed.saturating_add(1);
                return;
            },
            ResolutionOutcome::ResolvedExact { .. } => {
                self.counts.resolved_exact = self.counts.resolved_exact.saturating_add(1);
                (EntryStatus::Exact, None, None)
            },
            ResolutionOutcome::ResolvedFuzzy { score, .. } => {
                self.counts.resolved_fuzzy = self.counts.resolved_fuzzy.saturating_add(1);
                (EntryStatus::Fuzzy, None, Some(score))
            },
            ResolutionOutcome::Unresolved { reason, score } => {
                self.counts.unresolved = self.counts.unresolved.saturating_add(1);
                (EntryStatus::Unresolved, Some(FailureCategory::from(reason)), score)
            },
        };

        self.entries.push(ReportEntry {
            category,
            detail: None,
            document: result.link.source_document.clone(),
            line: result.link.line_number_in_document,
            new_url: result.new_url.clone(),
            score,
            status,
            url: result.link.raw_text.clone(),
        });
    }
}

/// Score descending with unscored entries last, then document and line.
fn compare_entries(a: &ReportEntry, b: &ReportEntry) -> Ordering {
    let by_score = match (a.sort_score(), b.sort_score()) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    return by_score
        .then_with(|| return a.document.cmp(&b.document))
        .then_with(|| return a.line.cmp(&b.line));
}

/// The finished report of a run.
#[derive(Debug, Serialize)]
pub struct Report {
    /// Final counts.
    pub counts: Counts,
    /// Whether documents were left unwritten.
    pub dry_run: bool,
    /// Sorted outcome log.
    pub entries: Vec<ReportEntry>,
}

/// JSON shape of the report.
#[derive(Serialize)]
struct ReportJson<'a> {
    /// Category table.
    categories: Vec<CategoryRow>,
    /// Final counts.
    counts: Counts,
    /// Dry-run flag.
    dry_run: bool,
    /// Sorted outcome log.
    entries: &'a [ReportEntry],
}

impl Report {
    /// Failure counts per category, in table order.
    pub fn categories(&self) -> Vec<CategoryRow> {
        return FailureCategory::ALL
            .iter()
            .map(|&category| {
                let count = self.entries.iter().filter(|e| return e.category == Some(category)).count();
                return CategoryRow { category, count, hint: category.hint() };
            })
            .collect();
    }

    /// One line per unresolved or erroring link, in log order.
    pub fn failure_lines(&self) -> Vec<String> {
        return self
            .entries
            .iter()
            .filter(|e| return e.status == EntryStatus::Unresolved)
            .map(ReportEntry::failure_line)
            .collect();
    }

    /// Serialize the whole report, including the category table.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if serialization fails.
    pub fn to_json(&self) -> Result<String, Error> {
        let json = ReportJson {
            categories: self.categories(),
            counts: self.counts,
            dry_run: self.dry_run,
            entries: &self.entries,
        };
        return Ok(serde_json::to_string_pretty(&json)?);
    }

    /// Render the report as markdown: log, failures, category table, counts.
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        if !self.entries.is_empty() {
            out.push_str("## Log\n\n");
            for entry in &self.entries {
                let _ = writeln!(out, "- {}", render_log_line(entry));
            }
            out.push('\n');
        }

        let failures = self.failure_lines();
        if !failures.is_empty() {
            out.push_str("## Failures\n\n");
            for line in &failures {
                let _ = writeln!(out, "- {line}");
            }
            out.push_str("\n| Category | Count | Hint |\n|----------|-------|------|\n");
            for row in self.categories() {
                let _ = writeln!(out, "| {:?} | {} | {} |", row.category, row.count, row.hint);
            }
            out.push('\n');
        }

        let c = &self.counts;
        let _ = writeln!(
            out,
            "{} resolved exact, {} resolved fuzzy, {} unresolved ({} bypassed, {} of {} documents {})",
            c.resolved_exact,
            c.resolved_fuzzy,
            c.unresolved,
            c.bypassed,
            c.documents_changed,
            c.documents_scanned,
            if self.dry_run { "would change" } else { "changed" },
        );
        return out;
    }
}

/// One log line for the text report.
fn render_log_line(entry: &ReportEntry) -> String {
    let location = format!("{}:{}", entry.document.display(), entry.line);
    return match (entry.status, &entry.new_url) {
        (EntryStatus::Exact, Some(new_url)) => format!("{location}  exact  {} -> {new_url}", entry.url),
        (EntryStatus::Fuzzy, Some(new_url)) => format!(
            "{location}  fuzzy {:.3}  {} -> {new_url}",
            entry.score.unwrap_or_default(),
            entry.url
        ),
        _ => entry.failure_line(),
    };
}
