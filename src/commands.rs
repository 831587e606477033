//! Core CLI commands for relink: fix, scan, resolve, info.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Error;
use crate::git::GitSource;
use crate::permalink;
use crate::report::{Report, ReportBuilder};
use crate::resolver::{LinkResolver, ResolverSettings};
use crate::rewriter;
use crate::scanner;
use crate::similarity::SimilarityScorer;
use crate::store::{RevisionStore, SnapshotKey};
use crate::types::{BypassReason, Document, LinkReference, ResolutionOutcome};

/// How `fix` prints its report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown log, failure table, and counts.
    #[default]
    Text,
    /// The whole report as JSON.
    Json,
}

/// Run-scoped state: one resolver, the outcomes seen so far, and the report.
/// Nothing here is global, so independent runs can share a process.
struct Run<'a> {
    /// Compute substitutions without writing documents.
    dry_run: bool,
    /// Report under construction.
    report: ReportBuilder,
    /// Only links into this repository are touched.
    repository: Option<&'a str>,
    /// Resolver over the shared store.
    resolver: LinkResolver<'a>,
    /// Outcome per raw URL, so a link repeated across documents resolves once.
    seen: HashMap<String, ResolutionOutcome>,
    /// Revision links are migrated toward.
    target: &'a str,
}

impl<'a> Run<'a> {
    /// Start a run over `store`.
    fn new(
        config: &'a Config,
        settings: &'a ResolverSettings,
        store: &'a RevisionStore,
        scorer: &'a dyn SimilarityScorer,
    ) -> Self {
        return Self {
            dry_run: config.dry_run,
            report: ReportBuilder::default(),
            repository: config.repository.as_deref(),
            resolver: LinkResolver::new(store, scorer, settings),
            seen: HashMap::new(),
            target: settings.target_revision.as_str(),
        };
    }

    /// Resolve, rewrite, and persist one document. Failures stay inside the document.
    fn process(&mut self, document: &Document) {
        let resolver = &self.resolver;
        let seen = &mut self.seen;
        let rewrite = rewriter::rewrite_content(
            &document.content,
            &document.path,
            self.target,
            self.repository,
            |link| {
                return seen
                    .entry(link.raw_text.clone())
                    .or_insert_with(|| return resolver.resolve(link))
                    .clone();
            },
        );

        for result in &rewrite.links {
            self.report.record_link(result);
        }

        match rewriter::apply(document, &rewrite, self.dry_run) {
            Ok(changed) => self.report.document_done(changed),
            Err(e) => {
                warn!(document = %document.path.display(), error = %e, "could not write document");
                self.report.record_document_error(&document.path, &e);
                self.report.document_done(false);
            },
        }
    }
}

/// Scan the corpus, prefetch snapshots, then resolve and rewrite each document in turn.
///
/// # Errors
///
/// Returns config validation errors, a missing target revision, or
/// `Error::CorpusNotFound`. Per-link and per-document failures are reported, not returned.
pub fn run_fix(root: &Path, store: &RevisionStore, config: &Config) -> Result<Report, Error> {
    config.validate()?;
    let settings = ResolverSettings::from_config(config)?;
    let scorer = config.scorer.build();
    let paths = scanner::discover(root, config)?;
    debug!(documents = paths.len(), scorer = config.scorer.name(), "discovered corpus");

    let mut run = Run::new(config, &settings, store, scorer.as_ref());
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        match std::fs::read_to_string(&path) {
            Ok(content) => documents.push(Document { content, path }),
            Err(e) => {
                warn!(document = %path.display(), error = %e, "could not read document");
                run.report.record_document_error(&path, &Error::Io(e));
                run.report.document_done(false);
            },
        }
    }

    let keys = collect_snapshot_keys(&documents, &run.resolver, config.repository.as_deref());
    store.prefetch(&keys, config.jobs);

    for document in &documents {
        run.process(document);
    }

    return Ok(run.report.finish(config.dry_run));
}

/// Distinct snapshot keys needed by every non-bypassed link, in sorted order.
fn collect_snapshot_keys(
    documents: &[Document],
    resolver: &LinkResolver<'_>,
    repository: Option<&str>,
) -> Vec<SnapshotKey> {
    let mut keys = BTreeSet::new();
    for document in documents {
        for link in scanner::extract_links(&document.content, &document.path, repository) {
            keys.extend(resolver.snapshot_keys(&link));
        }
    }
    return keys.into_iter().collect();
}

/// Re-anchor every stale permalink under `root` against the history of `repo`.
/// Always completes and reports; only configuration or corpus errors are fatal.
///
/// # Errors
///
/// Returns errors from config validation, corpus discovery, or report output.
pub fn fix(root: &Path, repo: &Path, config: &Config, format: OutputFormat) -> Result<(), Error> {
    let store = RevisionStore::new(Box::new(GitSource::new(repo.to_path_buf(), config.fetch_timeout)));
    let report = run_fix(root, &store, config)?;
    eprintln!("Fetched {} snapshots from {}", store.fetch_count(), repo.display());

    match format {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => print!("{}", report.render_text()),
    }

    if let Some(log_path) = &config.failure_log {
        let mut lines = report.failure_lines().join("\n");
        if !lines.is_empty() {
            lines.push('\n');
        }
        std::fs::write(log_path, lines)?;
        eprintln!("Wrote failure log to {}", log_path.display());
    }

    if report.dry_run && report.counts.documents_changed > 0 {
        eprintln!("Dry run: no documents were written.");
    }
    return Ok(());
}

/// Output a reference document for relink.
pub fn info(config_path: &Path, json: bool) {
    return crate::info::run(config_path, json);
}

/// Label for a link in `scan` output.
fn classify(link: &LinkReference, target: Option<&str>) -> &'static str {
    if target.is_some_and(|t| return t == link.old_revision) {
        return "CURRENT";
    }
    if permalink::is_commit_hash(&link.old_revision) {
        return "PINNED ";
    }
    return "STALE  ";
}

/// Resolve a single permalink and print the outcome.
/// Exits 1 when the link cannot be re-anchored.
///
/// # Errors
///
/// Returns `Error::InvalidPermalink` for malformed input, or config errors.
pub fn resolve(url: &str, repo: &Path, config: &Config) -> Result<ExitCode, Error> {
    config.validate()?;
    let Some(link) = permalink::parse(url) else {
        return Err(Error::InvalidPermalink { url: url.to_string() });
    };

    let settings = ResolverSettings::from_config(config)?;
    let scorer = config.scorer.build();
    let store = RevisionStore::new(Box::new(GitSource::new(repo.to_path_buf(), config.fetch_timeout)));
    let resolver = LinkResolver::new(&store, scorer.as_ref(), &settings);

    let outcome = resolver.resolve(&link);
    let target = settings.target_revision.as_str();
    return Ok(match outcome {
        ResolutionOutcome::Bypassed { reason } => {
            let why = match reason {
                BypassReason::AlreadyCurrent => "already at target revision",
                BypassReason::PinnedCommit => "pinned to a commit",
            };
            println!("{url}");
            eprintln!("unchanged: {why}");
            ExitCode::SUCCESS
        },
        ResolutionOutcome::ResolvedExact { new_start, new_end } => {
            println!("{}", permalink::format(&link, target, new_start, new_end));
            eprintln!("exact match");
            ExitCode::SUCCESS
        },
        ResolutionOutcome::ResolvedFuzzy { new_start, new_end, score } => {
            println!("{}", permalink::format(&link, target, new_start, new_end));
            eprintln!("fuzzy match, score {score:.3}");
            ExitCode::SUCCESS
        },
        ResolutionOutcome::Unresolved { reason, score } => {
            let best = score.map(|s| return format!(", best score {s:.3}")).unwrap_or_default();
            eprintln!("unresolved: {reason:?}{best}");
            ExitCode::from(1)
        },
    });
}

/// List every permalink in the corpus with its classification against the target.
/// Unreadable documents are logged and skipped. Returns the number of links listed.
///
/// # Errors
///
/// Returns `Error::CorpusNotFound` if `root` is not a directory.
pub fn scan(root: &Path, config: &Config) -> Result<usize, Error> {
    let target = config.target_revision.as_deref();
    let mut total = 0_usize;

    for path in scanner::discover(root, config)? {
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!(document = %path.display(), error = %e, "could not read document");
                continue;
            },
        };
        let relative: PathBuf = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
        for link in scanner::extract_links(&content, &relative, config.repository.as_deref()) {
            println!(
                "{}  {}:{}  {}",
                classify(&link, target),
                relative.display(),
                link.line_number_in_document,
                link.raw_text
            );
            total = total.saturating_add(1);
        }
    }

    eprintln!("{total} permalinks");
    return Ok(total);
}
