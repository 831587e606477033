/// Crate-level error types for relink diagnostics.
use std::path::PathBuf;
use std::time::Duration;

/// All errors in relink carry enough context to produce a useful diagnostic
/// without a debugger. Each variant names the file, revision, or reason for failure.
#[allow(clippy::error_impl_error, reason = "crate-internal error type in binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Config file parsed but holds a value outside its allowed domain.
    #[error("invalid config: `{key}` {reason}")]
    ConfigInvalid {
        /// Offending configuration key.
        key: String,
        /// What is wrong with the value.
        reason: String,
    },

    /// The documentation root to scan does not exist.
    #[error("corpus root not found: {}", path.display())]
    CorpusNotFound {
        /// Path that was expected to be a directory.
        path: PathBuf,
    },

    /// The revision source refused or failed to produce a file.
    #[error("fetch failed: {revision}:{path}: {reason}")]
    FetchFailed {
        /// Repository path of the requested file.
        path: String,
        /// Why the fetch failed.
        reason: String,
        /// Revision the file was requested at.
        revision: String,
    },

    /// The revision source did not answer within the configured timeout.
    #[error("fetch timed out after {timeout:?}: {revision}:{path}")]
    FetchTimeout {
        /// Repository path of the requested file.
        path: String,
        /// Revision the file was requested at.
        revision: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// A string handed to `resolve` is not a line permalink.
    #[error("not a line permalink: {url}")]
    InvalidPermalink {
        /// The rejected input.
        url: String,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON serialization failed.
    #[error("json: {0}")]
    Json(
        /// The wrapped JSON error.
        #[from]
        serde_json::Error,
    ),

    /// No revision to migrate links toward was configured.
    #[error("no target revision configured")]
    MissingTargetRevision,

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),
}
