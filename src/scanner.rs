use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::config::Config;
use crate::error::Error;
use crate::permalink;
use crate::types::LinkReference;

/// Find every document under `root` with a configured extension.
/// Applies the config's include/exclude filters relative to `root` and skips
/// hidden directories such as `.git`. Paths are returned in a stable, sorted order.
///
/// # Errors
///
/// Returns `Error::CorpusNotFound` if `root` is not a directory.
pub fn discover(root: &Path, config: &Config) -> Result<Vec<PathBuf>, Error> {
    if !root.is_dir() {
        return Err(Error::CorpusNotFound { path: root.to_path_buf() });
    }

    let mut documents = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| return e.depth() == 0 || !is_hidden(e))
        .filter_map(Result::ok)
        .filter(|e| return e.file_type().is_file() && has_extension(e.path(), &config.extensions))
    {
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if !config.should_scan(&relative.to_string_lossy()) {
            continue;
        }
        documents.push(path.to_path_buf());
    }

    return Ok(documents);
}

/// Extract every line permalink from a document's content.
/// When `repository` is set, links into other repositories are dropped.
pub fn extract_links(content: &str, document: &Path, repository: Option<&str>) -> Vec<LinkReference> {
    let mut links = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let found = permalink::find_in_line(line, document, idx.saturating_add(1));
        links.extend(
            found
                .into_iter()
                .map(|(_, link)| return link)
                .filter(|link| return repository.is_none_or(|r| return permalink::matches_repository(link, r))),
        );
    }
    return links;
}

/// Check a path's extension against the configured list (case-insensitive).
fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| return e.to_str()) else {
        return false;
    };
    return extensions
        .iter()
        .any(|wanted| return wanted.trim_start_matches('.').eq_ignore_ascii_case(ext));
}

/// Dot-prefixed files and directories.
fn is_hidden(entry: &DirEntry) -> bool {
    return entry.file_name().to_str().is_some_and(|name| return name.starts_with('.'));
}
