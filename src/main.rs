mod commands;
mod config;
mod diagnostics;
mod error;
mod fuzzy;
mod git;
mod info;
mod matcher;
mod normalize;
mod permalink;
mod report;
mod resolver;
mod rewriter;
mod scanner;
mod similarity;
mod store;
mod types;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::OutputFormat;
use crate::config::{Config, Overrides};
use crate::similarity::ScorerKind;

#[derive(Parser)]
#[command(
    name = "relink",
    version,
    about = "Re-anchor stale source permalinks in docs to the same code at a newer revision"
)]
struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
    /// Path to the config file.
    #[arg(long, global = true, default_value = config::CONFIG_FILE)]
    config: PathBuf,
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

/// Flags shared by commands that resolve links.
#[derive(clap::Args)]
struct ResolveArgs {
    /// Worker threads for snapshot prefetch.
    #[arg(long)]
    jobs: Option<usize>,
    /// Git repository that holds the linked history.
    #[arg(long, default_value = ".")]
    repo: PathBuf,
    /// Similarity strategy for fuzzy alignment.
    #[arg(long, value_enum)]
    scorer: Option<ScorerKind>,
    /// Revision to migrate links toward.
    #[arg(long)]
    target: Option<String>,
    /// Minimum fuzzy similarity to accept (0.0 to 1.0).
    #[arg(long)]
    threshold: Option<f64>,
    /// Extra lines an exact-match window may hold beyond the old range.
    #[arg(long)]
    window_slack: Option<usize>,
}

impl ResolveArgs {
    /// Command-line overrides for the loaded config.
    fn overrides(&self, dry_run: bool) -> Overrides {
        return Overrides {
            dry_run,
            jobs: self.jobs,
            scorer: self.scorer,
            target_revision: self.target.clone(),
            threshold: self.threshold,
            window_slack: self.window_slack,
        };
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite stale permalinks in every document under a root
    Fix {
        /// Shared resolution flags.
        #[command(flatten)]
        args: ResolveArgs,
        /// Report what would change without writing documents.
        #[arg(long)]
        dry_run: bool,
        /// Report format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Documentation root to scan.
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// List permalinks in the corpus and whether they are stale
    Scan {
        /// Documentation root to scan.
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Revision considered current.
        #[arg(long)]
        target: Option<String>,
    },
    /// Re-anchor a single permalink and print the new URL
    Resolve {
        /// Shared resolution flags.
        #[command(flatten)]
        args: ResolveArgs,
        /// The permalink to resolve.
        url: String,
    },
    /// Show syntax, configuration keys, current state, and exit codes
    Info {
        /// Emit JSON instead of markdown.
        #[arg(long)]
        json: bool,
    },
}

/// Send diagnostics to stderr, filtered by `RUST_LOG` or the `-v` count.
fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| return EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    return match run(cli) {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(2)
        },
    };
}

/// Load config, apply flags, and dispatch to the command.
///
/// # Errors
///
/// Returns any fatal error from config loading or the command itself.
fn run(cli: Cli) -> Result<ExitCode, error::Error> {
    if let Commands::Info { json } = cli.command {
        commands::info(&cli.config, json);
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::load(&cli.config)?;
    return match cli.command {
        Commands::Fix { args, dry_run, format, root } => {
            let config = config.with_overrides(args.overrides(dry_run));
            commands::fix(&root, &args.repo, &config, format)?;
            Ok(ExitCode::SUCCESS)
        },
        Commands::Scan { root, target } => {
            let overrides = Overrides { target_revision: target, ..Overrides::default() };
            commands::scan(&root, &config.with_overrides(overrides))?;
            Ok(ExitCode::SUCCESS)
        },
        Commands::Resolve { args, url } => {
            let config = config.with_overrides(args.overrides(false));
            commands::resolve(&url, &args.repo, &config)
        },
        Commands::Info { .. } => Ok(ExitCode::SUCCESS),
    };
}
