//! The changelog pipeline.
//!
//! ```text
//! cache walk ─▶ repository listing ─▶ primary.xml ─▶ range GET ─▶ header ─▶ stdout
//! ```
//!
//! Every stage runs to completion before the next one starts, one package
//! at a time. The first error ends the run; anything already printed stays
//! printed.

use anyhow::{anyhow, Context as _, Result};
use std::io::{BufReader, Write};
use tracing::{debug, info};

use crate::changelog;
use crate::config::Config;
use crate::fetch::{self, HeaderSource, ScratchFile};
use crate::filter::PackageFilter;
use crate::header;
use crate::metadata;
use crate::repos::{self, RepositoryLister};

/// Per-invocation options taken from the command line.
#[derive(Debug, Clone)]
pub struct Options {
    pub verbose: bool,
    pub filter: PackageFilter,
    pub repositories: Vec<String>,
}

impl Options {
    pub fn new(verbose: bool, filter: PackageFilter, repositories: &[String]) -> Self {
        let repositories = repositories
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            verbose,
            filter,
            repositories,
        }
    }
}

/// Everything the stages need, passed explicitly.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    pub options: Options,
}

/// Run the whole pipeline, writing changelogs to `out`.
pub fn run<W: Write>(
    ctx: &Context,
    lister: &dyn RepositoryLister,
    source: &dyn HeaderSource,
    out: &mut W,
) -> Result<()> {
    let files = repos::find_metadata_files(
        &ctx.config.cache_root,
        &ctx.config.metadata_suffix,
        &ctx.options.repositories,
    )?;
    if files.is_empty() {
        debug!(repositories = ?ctx.options.repositories, "no cached metadata found");
        return Ok(());
    }

    let repositories = lister.list_repositories()?;
    let mut scratch = ScratchFile::new(&ctx.config.scratch_file);

    for file in &files {
        let mirror = repos::mirror_for(file, &repositories).ok_or_else(|| {
            anyhow!(
                "No configured repository matches metadata file {}",
                file.display()
            )
        })?;
        debug!(file = %file.display(), alias = %mirror.alias, url = %mirror.url, "reading metadata");

        let reader = metadata::open_metadata(file)?;
        let packages = metadata::parse_packages(reader, &ctx.options.filter)
            .with_context(|| format!("Failed to parse metadata file: {}", file.display()))?;

        for package in &packages {
            debug!(
                name = %package.name,
                version = package.version.as_deref().unwrap_or("-"),
                arch = package.arch.as_deref().unwrap_or("-"),
                ranges = package.header_ranges.len(),
                "selected package"
            );
            for range in &package.header_ranges {
                let url = fetch::package_url(&mirror.url, &package.location);
                info!("{}", url);

                let bytes = source.fetch(&url, *range)?;
                let stored = scratch.store(&bytes)?;
                let parsed = header::parse_changelog(BufReader::new(stored))
                    .with_context(|| format!("Failed to parse RPM header from {}", url))?;

                changelog::write_entries(out, &changelog::entries(parsed), ctx.options.verbose)
                    .with_context(|| "Failed to write changelog")?;
            }
        }
    }

    out.flush()?;
    Ok(())
}
