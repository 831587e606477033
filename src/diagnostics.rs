use std::path::Path;

use crate::config;
use crate::error::Error;

/// Heading color for terminal output.
const BOLD: &str = "\x1b[1m";
/// Reset after a heading.
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Each fatal variant produces a block with what happened and how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::ConfigInvalid { key, reason } => render_config_invalid(key, reason),
        Error::CorpusNotFound { path } => render_corpus_not_found(path),
        Error::InvalidPermalink { url } => render_invalid_permalink(url),
        Error::MissingTargetRevision => render_missing_target(),
        Error::TomlDe(inner) => format!(
            "\
# Error: Invalid Config

{inner}

## Fix

Check `{}` against `relink info`.
",
            config::CONFIG_FILE
        ),
        Error::FetchFailed { .. } | Error::FetchTimeout { .. } | Error::Io(_) | Error::Json(_) => {
            format!(
                "\
# Error

{e}
"
            )
        },
    };
}

/// A config value outside its allowed domain.
fn render_config_invalid(key: &str, reason: &str) -> String {
    return format!(
        "\
# Error: Invalid Config Value

`{key}` {reason}.

## Fix

Correct `{key}` in `{}` or override it on the command line.
",
        config::CONFIG_FILE
    );
}

/// The documentation root is missing.
fn render_corpus_not_found(path: &Path) -> String {
    return format!(
        "\
# Error: Corpus Not Found

`{}` is not a directory.

## Fix

Point `--root` at the documentation directory:

    relink fix --root docs/ --target v2
",
        path.display()
    );
}

/// Input to `resolve` that is not a line permalink.
fn render_invalid_permalink(url: &str) -> String {
    return format!(
        "\
# Error: Invalid Permalink

`{url}` is not a line permalink.

## Expected

    https://<host>/<org>/<repo>/blob/<revision>/<path>#L<start>[-L<end>]
"
    );
}

/// No target revision from config or flags.
fn render_missing_target() -> String {
    return format!(
        "\
# Error: Missing Target Revision

No revision to migrate links toward.

## Fix

Pass `--target`:

    relink fix --target v2

Or set it in `{}`:

    target_revision = \"v2\"
",
        config::CONFIG_FILE
    );
}
