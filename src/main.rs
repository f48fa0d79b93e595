//! # rpm-changelog CLI
//!
//! Shows the changelog of one or more packages from the configured zypp
//! repositories.
//!
//! ## Usage
//!
//! ```bash
//! rpm-changelog [--config <file>] [-d] [-v] [-e] [-a] [-p <package>] [-r <repos>]
//! ```
//!
//! ## Examples
//!
//! ```bash
//! # Entries of one package from the default repository
//! rpm-changelog -p vim
//!
//! # Every package whose name starts with "python3-", including entry texts
//! rpm-changelog -e -p 'python3-' -v
//!
//! # All packages of two repositories
//! rpm-changelog -a -r repo-oss,repo-update
//! ```
//!
//! Invoked without arguments, the help text is printed.

use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::io;
use std::path::PathBuf;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use rpm_changelog::config;
use rpm_changelog::fetch::HttpHeaderSource;
use rpm_changelog::filter::PackageFilter;
use rpm_changelog::pipeline::{self, Context, Options};
use rpm_changelog::repos::ZypperLister;

/// Shows the changelog of one or more packages.
///
/// Package headers are fetched with HTTP range requests using the locally
/// cached repository metadata, so nothing is installed or fully downloaded.
#[derive(Parser, Debug)]
#[command(name = "rpm-changelog", version, about)]
struct Cli {
    /// Debug mode.
    #[arg(short, long)]
    debug: bool,

    /// Verbose mode: print the text of each changelog entry.
    #[arg(short, long)]
    verbose: bool,

    /// Treat the package name as a regular expression matched at the start
    /// of package names.
    #[arg(short, long)]
    expression: bool,

    /// Package name or regular expression to match packages.
    #[arg(short, long)]
    package: Option<String>,

    /// Comma separated list of repositories to search for changelogs.
    #[arg(short, long, value_delimiter = ',', default_value = "repo-oss")]
    repositories: Vec<String>,

    /// List changelogs for all packages.
    #[arg(short, long)]
    all: bool,

    /// Path to a configuration file (TOML). Built-in defaults are used
    /// when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("rpm_changelog=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    if std::env::args_os().len() <= 1 {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    }

    let cli = Cli::parse();
    init_tracing(cli.debug);
    debug!(
        args = ?std::env::args_os().collect::<Vec<_>>(),
        "command line"
    );

    let cfg = config::resolve_config(cli.config.as_deref())?;
    let filter = PackageFilter::new(cli.all, cli.expression, cli.package.as_deref())?;
    if matches!(filter, PackageFilter::Nothing) {
        warn!("no --package given and --all not set; no package will match");
    }

    let lister = ZypperLister::new(cfg.zypper_command.clone());
    let source = HttpHeaderSource::new()?;
    let ctx = Context {
        config: cfg,
        options: Options::new(cli.verbose, filter, &cli.repositories),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    pipeline::run(&ctx, &lister, &source, &mut out)
}
