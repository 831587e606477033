use std::path::Path;

use serde::Serialize;

use crate::config::Config;

/// Output the relink reference document.
pub fn run(config_path: &Path, json: bool) {
    let state = gather_state(config_path);

    if json {
        print_json(&state);
    } else {
        print_markdown(&state);
    }
}

/// Exit codes and their meaning.
const EXIT_CODES: [(u8, &str); 3] = [
    (0, "Run completed (unresolved links are reported, not fatal)"),
    (1, "`resolve` could not re-anchor the given link"),
    (2, "Fatal error: invalid config, missing corpus, or no target revision"),
];

// ── State gathering ───────────────────────────────────────────────────

/// What `info` can tell about the working directory.
#[derive(Serialize)]
struct CurrentState {
    /// Load error, if the file exists but is invalid.
    config_error: Option<String>,
    /// Whether the file exists.
    config_found: bool,
    /// Path of the config file consulted.
    config_path: String,
    /// Effective fuzzy threshold.
    fuzzy_threshold: f64,
    /// Effective scorer name.
    scorer: &'static str,
    /// Effective target revision.
    target_revision: Option<String>,
    /// Effective exact-match slack.
    window_slack: usize,
}

/// Load the config without failing; errors are shown in the state instead.
fn gather_state(config_path: &Path) -> CurrentState {
    let loaded = Config::load(config_path).and_then(|c| {
        c.validate()?;
        return Ok(c);
    });
    let config_error = loaded.as_ref().err().map(ToString::to_string);
    let config = loaded.unwrap_or_default();

    return CurrentState {
        config_error,
        config_found: config_path.exists(),
        config_path: config_path.display().to_string(),
        fuzzy_threshold: config.fuzzy_threshold,
        scorer: config.scorer.name(),
        target_revision: config.target_revision,
        window_slack: config.window_slack,
    };
}

// ── Markdown output ───────────────────────────────────────────────────

/// Human-readable reference.
fn print_markdown(state: &CurrentState) {
    let version = env!("CARGO_PKG_VERSION");
    print_markdown_header(version);
    print_markdown_state(state);
    println!();
    println!("## Exit Codes\n");
    println!("| Code | Meaning |");
    println!("|------|---------|");
    for (code, meaning) in EXIT_CODES {
        println!("| {code}    | {meaning} |");
    }
}

/// Static part of the reference.
fn print_markdown_header(version: &str) {
    print!(
        "\
# relink {version}

Re-anchor stale source permalinks in documentation to the same code at a
newer revision. Exact matching first, fuzzy alignment as fallback.

## Permalink Syntax

    https://<host>/<org>/<repo>/blob/<revision>/<path>#L<start>
    https://<host>/<org>/<repo>/blob/<revision>/<path>#L<start>-L<end>

Links already at the target revision and links pinned to a commit hash are left alone.

## Workflow

    relink scan --target v2                 List permalinks and whether they are stale
    relink fix --target v2 --dry-run        Report what would change
    relink fix --target v2 --root docs/     Rewrite documents in place
    relink resolve <url> --target v2        Re-anchor a single link

## Configuration (.relink.toml)

    target_revision = \"v2\"          # revision to migrate toward
    fuzzy_threshold = 0.8           # minimum fuzzy similarity
    fuzzy_spread = 2                # window sizes n-2 ..= n+2
    window_slack = 10               # extra lines allowed in an exact window
    scorer = \"char-ratio\"           # char-ratio | levenshtein | token-ratio
    repository = \"github.com/o/r\"   # only touch links into this repo
    extensions = [\"md\"]             # document extensions
    include = [\"docs/\"]             # only scan these prefixes
    exclude = [\"docs/archive/\"]     # skip these prefixes
    jobs = 4                        # prefetch workers
    fetch_timeout_secs = 30         # per-file git timeout
    failure_log = \"relink-failures.txt\"
    dry_run = false

Logging goes to stderr; set `RUST_LOG` or pass `-v` / `-vv`.

## Current State

"
    );
}

/// Effective configuration.
fn print_markdown_state(state: &CurrentState) {
    let found = if state.config_found { "found" } else { "not found" };
    println!("Config:     {} ({found})", state.config_path);
    if let Some(err) = &state.config_error {
        println!("Error:      {err}");
    }
    println!("Target:     {}", state.target_revision.as_deref().unwrap_or("(none)"));
    println!("Scorer:     {}", state.scorer);
    println!("Threshold:  {}", state.fuzzy_threshold);
    println!("Slack:      {}", state.window_slack);
}

// ── JSON output ───────────────────────────────────────────────────────

/// Machine-readable reference.
#[derive(Serialize)]
struct InfoJson<'a> {
    /// Current state of the working directory.
    current_state: &'a CurrentState,
    /// Exit codes.
    exit_codes: Vec<ExitCodeInfo>,
    /// Crate version.
    version: &'static str,
}

/// One exit code.
#[derive(Serialize)]
struct ExitCodeInfo {
    /// Process exit status.
    code: u8,
    /// When it is returned.
    meaning: &'static str,
}

/// Print the JSON form.
fn print_json(state: &CurrentState) {
    let info = InfoJson {
        current_state: state,
        exit_codes: EXIT_CODES
            .iter()
            .map(|&(code, meaning)| return ExitCodeInfo { code, meaning })
            .collect(),
        version: env!("CARGO_PKG_VERSION"),
    };

    // serde_json::to_string_pretty won't fail on this structure.
    let json = serde_json::to_string_pretty(&info).unwrap_or_default();
    println!("{json}");
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used, reason = "tests")]
mod tests {
    use super::*;

    #[test]
    fn state_reports_invalid_config_without_failing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".relink.toml");
        std::fs::write(&path, "fuzzy_threshold = 3.0\n").unwrap();

        let state = gather_state(&path);
        assert!(state.config_found);
        assert!(state.config_error.is_some());
        assert!((state.fuzzy_threshold - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn state_reflects_loaded_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".relink.toml");
        std::fs::write(&path, "target_revision = \"v9\"\nscorer = \"levenshtein\"\n").unwrap();

        let state = gather_state(&path);
        assert_eq!(state.target_revision.as_deref(), Some("v9"));
        assert_eq!(state.scorer, "levenshtein");
        assert!(state.config_error.is_none());
    }
}
