use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
use crate::similarity::ScorerKind;

/// Default name of the project config file.
pub const CONFIG_FILE: &str = ".relink.toml";

/// Run configuration loaded from `.relink.toml` and overridden by CLI flags.
/// Include/exclude patterns are path prefixes applied to documents relative to the corpus root.
#[derive(Debug, Clone)]
pub struct Config {
    /// Compute and report changes without writing documents.
    pub dry_run: bool,
    /// Exclude prefixes for documents.
    pub exclude: Vec<String>,
    /// Document extensions to scan, without the leading dot.
    pub extensions: Vec<String>,
    /// Optional file that receives the failure log.
    pub failure_log: Option<PathBuf>,
    /// Upper bound on a single revision fetch.
    pub fetch_timeout: Duration,
    /// How many lines shorter or longer than the old range a fuzzy window may be.
    pub fuzzy_spread: usize,
    /// Minimum similarity for a fuzzy match to be accepted.
    pub fuzzy_threshold: f64,
    /// Include prefixes for documents. Empty means everything.
    pub include: Vec<String>,
    /// Worker count for the revision prefetch pool.
    pub jobs: usize,
    /// Only links into this `host/org/repo` are considered, when set.
    pub repository: Option<String>,
    /// Similarity strategy used by the fuzzy aligner.
    pub scorer: ScorerKind,
    /// Revision every stale link is migrated toward.
    pub target_revision: Option<String>,
    /// Extra lines an exact-match window may hold beyond the old range (K).
    pub window_slack: usize,
}

/// Raw TOML structure for `.relink.toml`.
#[derive(serde::Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RelinkTomlConfig {
    /// See [`Config::dry_run`].
    dry_run: Option<bool>,
    /// See [`Config::exclude`].
    #[serde(default)]
    exclude: Vec<String>,
    /// See [`Config::extensions`].
    extensions: Option<Vec<String>>,
    /// See [`Config::failure_log`].
    failure_log: Option<PathBuf>,
    /// Fetch timeout in whole seconds.
    fetch_timeout_secs: Option<u64>,
    /// See [`Config::fuzzy_spread`].
    fuzzy_spread: Option<usize>,
    /// See [`Config::fuzzy_threshold`].
    fuzzy_threshold: Option<f64>,
    /// See [`Config::include`].
    #[serde(default)]
    include: Vec<String>,
    /// See [`Config::jobs`].
    jobs: Option<usize>,
    /// See [`Config::repository`].
    repository: Option<String>,
    /// See [`Config::scorer`].
    scorer: Option<ScorerKind>,
    /// See [`Config::target_revision`].
    target_revision: Option<String>,
    /// See [`Config::window_slack`].
    window_slack: Option<usize>,
}

/// Values given on the command line. `None` keeps the file value.
#[derive(Debug, Default)]
pub struct Overrides {
    /// `--dry-run`.
    pub dry_run: bool,
    /// `--jobs`.
    pub jobs: Option<usize>,
    /// `--scorer`.
    pub scorer: Option<ScorerKind>,
    /// `--target`.
    pub target_revision: Option<String>,
    /// `--threshold`.
    pub threshold: Option<f64>,
    /// `--window-slack`.
    pub window_slack: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        return Self::from_raw(RelinkTomlConfig::default());
    }
}

impl Config {
    /// Apply command-line overrides on top of the loaded values.
    #[must_use]
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if overrides.dry_run {
            self.dry_run = true;
        }
        if let Some(jobs) = overrides.jobs {
            self.jobs = jobs;
        }
        if let Some(scorer) = overrides.scorer {
            self.scorer = scorer;
        }
        if overrides.target_revision.is_some() {
            self.target_revision = overrides.target_revision;
        }
        if let Some(threshold) = overrides.threshold {
            self.fuzzy_threshold = threshold;
        }
        if let Some(slack) = overrides.window_slack {
            self.window_slack = slack;
        }
        return self;
    }

    /// Build a config from the raw file structure, filling defaults.
    fn from_raw(raw: RelinkTomlConfig) -> Self {
        return Self {
            dry_run: raw.dry_run.unwrap_or(false),
            exclude: raw.exclude,
            extensions: raw.extensions.unwrap_or_else(|| return vec!["md".to_string()]),
            failure_log: raw.failure_log,
            fetch_timeout: Duration::from_secs(raw.fetch_timeout_secs.unwrap_or(30)),
            fuzzy_spread: raw.fuzzy_spread.unwrap_or(2),
            fuzzy_threshold: raw.fuzzy_threshold.unwrap_or(0.8),
            include: raw.include,
            jobs: raw.jobs.unwrap_or(4),
            repository: raw.repository,
            scorer: raw.scorer.unwrap_or_default(),
            target_revision: raw.target_revision,
            window_slack: raw.window_slack.unwrap_or(10),
        };
    }

    /// Load config from the given file path.
    /// Returns defaults if the file doesn't exist.
    /// Returns an error if the file exists but is malformed; never silently
    /// falls back to defaults when the user wrote a config file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = match std::fs::read_to_string(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };
        return Self::parse(&content);
    }

    /// Parse config from TOML content.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the TOML is malformed or has unknown keys.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let raw: RelinkTomlConfig = toml::from_str(content)?;
        return Ok(Self::from_raw(raw));
    }

    /// The target revision, required by commands that rewrite or resolve.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingTargetRevision` when none was configured.
    pub fn require_target(&self) -> Result<&str, Error> {
        return self.target_revision.as_deref().ok_or(Error::MissingTargetRevision);
    }

    /// Check whether a document path (relative to the corpus root) should be scanned.
    ///
    /// A path is included if no include patterns are set (scan everything),
    /// or if the path starts with at least one include pattern.
    /// An included path is then excluded if it starts with any exclude pattern.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| return relative_path.starts_with(p.as_str()));

        if !included {
            return false;
        }

        return !self.exclude.iter().any(|p| return relative_path.starts_with(p.as_str()));
    }

    /// Reject values the matchers cannot work with.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigInvalid` naming the first offending key.
    pub fn validate(&self) -> Result<(), Error> {
        if !(0.0..=1.0).contains(&self.fuzzy_threshold) {
            return Err(Error::ConfigInvalid {
                key: "fuzzy_threshold".to_string(),
                reason: format!("must be within [0, 1], got {}", self.fuzzy_threshold),
            });
        }
        if self.jobs == 0 {
            return Err(Error::ConfigInvalid {
                key: "jobs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.extensions.is_empty() {
            return Err(Error::ConfigInvalid {
                key: "extensions".to_string(),
                reason: "must list at least one extension".to_string(),
            });
        }
        if self.fetch_timeout.is_zero() {
            return Err(Error::ConfigInvalid {
                key: "fetch_timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        return Ok(());
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used, reason = "tests")]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.window_slack, 10);
        assert_eq!(config.fuzzy_spread, 2);
        assert_eq!(config.extensions, vec!["md".to_string()]);
        assert!(!config.dry_run);
        assert!(config.target_revision.is_none());
    }

    #[test]
    fn parses_full_file() {
        let config = Config::parse(
            r#"
target_revision = "v0.50.0"
fuzzy_threshold = 0.7
window_slack = 4
dry_run = true
scorer = "levenshtein"
include = ["docs/"]
repository = "github.com/cosmos/cosmos-sdk"
"#,
        )
        .unwrap();
        assert_eq!(config.require_target().unwrap(), "v0.50.0");
        assert!((config.fuzzy_threshold - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.window_slack, 4);
        assert!(config.dry_run);
        assert_eq!(config.scorer, ScorerKind::Levenshtein);
        assert!(config.should_scan("docs/guide.md"));
        assert!(!config.should_scan("README.md"));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = Config::parse("fuzzy_treshold = 0.7").unwrap_err();
        assert!(matches!(err, Error::TomlDe(_)), "got {err:?}");
    }

    #[test]
    fn rejects_threshold_out_of_range() {
        let config = Config::parse("fuzzy_threshold = 1.5").unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid { ref key, .. } if key == "fuzzy_threshold"));
    }

    #[test]
    fn overrides_win_over_file() {
        let config = Config::parse("target_revision = \"v1\"\nfuzzy_threshold = 0.9")
            .unwrap()
            .with_overrides(Overrides {
                dry_run: true,
                target_revision: Some("v2".to_string()),
                threshold: Some(0.75),
                ..Overrides::default()
            });
        assert_eq!(config.require_target().unwrap(), "v2");
        assert!((config.fuzzy_threshold - 0.75).abs() < f64::EPSILON);
        assert!(config.dry_run);
    }

    #[test]
    fn exclude_wins_over_include() {
        let config = Config::parse("include = [\"docs/\"]\nexclude = [\"docs/archive/\"]").unwrap();
        assert!(config.should_scan("docs/a.md"));
        assert!(!config.should_scan("docs/archive/a.md"));
    }
}
