//! In-place permalink substitution for one document.

use std::path::Path;

use tracing::info;

use crate::error::Error;
use crate::permalink;
use crate::types::{Document, LinkReference, ResolutionOutcome};

/// One link of a document and what became of it.
#[derive(Debug, Clone)]
pub struct LinkResult {
    /// The link as found.
    pub link: LinkReference,
    /// Replacement URL, present only for resolved links.
    pub new_url: Option<String>,
    /// Resolution outcome.
    pub outcome: ResolutionOutcome,
}

/// The rewritten text of a document plus every link it contained.
#[derive(Debug)]
pub struct DocumentRewrite {
    /// Text with all resolved links substituted.
    pub content: String,
    /// Links in document order.
    pub links: Vec<LinkResult>,
}

impl DocumentRewrite {
    /// Whether any substitution altered the text.
    pub fn changed(&self, original: &str) -> bool {
        return self.content != original;
    }
}

/// Substitute every resolvable permalink in `content`.
///
/// `resolve` is asked once per link occurrence. Resolved links are rewritten to
/// `target` at their new range; bypassed and unresolved links stay as written.
/// Line endings and all other text are preserved byte for byte.
pub fn rewrite_content<F>(
    content: &str,
    document: &Path,
    target: &str,
    repository: Option<&str>,
    mut resolve: F,
) -> DocumentRewrite
where
    F: FnMut(&LinkReference) -> ResolutionOutcome,
{
    let mut output = String::with_capacity(content.len());
    let mut links = Vec::new();

    for (idx, line) in content.split_inclusive('\n').enumerate() {
        let mut cursor = 0_usize;
        for (span, link) in permalink::find_in_line(line, document, idx.saturating_add(1)) {
            if repository.is_some_and(|r| return !permalink::matches_repository(&link, r)) {
                continue;
            }
            let outcome = resolve(&link);
            let new_url = outcome
                .new_range()
                .map(|(start, end)| return permalink::format(&link, target, start, end));

            if let Some(url) = &new_url {
                output.push_str(line.get(cursor..span.start).unwrap_or_default());
                output.push_str(url);
                cursor = span.end;
            }
            links.push(LinkResult { link, new_url, outcome });
        }
        output.push_str(line.get(cursor..).unwrap_or_default());
    }

    return DocumentRewrite { content: output, links };
}

/// Log planned substitutions and persist them unless `dry_run` is set.
/// The document is only opened for writing when its text actually changed.
/// Returns whether the document changed (or would have, in a dry run).
///
/// # Errors
///
/// Returns `Error::Io` if the document cannot be written.
pub fn apply(document: &Document, rewrite: &DocumentRewrite, dry_run: bool) -> Result<bool, Error> {
    for result in &rewrite.links {
        if let Some(new_url) = &result.new_url {
            info!(
                document = %document.path.display(),
                line = result.link.line_number_in_document,
                from = %result.link.raw_text,
                to = %new_url,
                dry_run,
                "rewrite link"
            );
        }
    }

    if !rewrite.changed(&document.content) {
        return Ok(false);
    }
    if !dry_run {
        std::fs::write(&document.path, &rewrite.content)?;
    }
    return Ok(true);
}
