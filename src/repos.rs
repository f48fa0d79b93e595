//! Repository discovery.
//!
//! Two independent sources are combined here: the raw metadata cache that
//! zypp keeps on disk, and the repository list reported by `zypper -x lr`.
//! The cache tells us which primary documents exist, the listing tells us
//! where each repository's packages can be downloaded from.

use anyhow::{bail, Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::models::RepositoryReference;

/// Source of configured repositories.
pub trait RepositoryLister {
    fn list_repositories(&self) -> Result<Vec<RepositoryReference>>;
}

/// Lists repositories by running `zypper -x lr`.
pub struct ZypperLister {
    command: String,
}

impl ZypperLister {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl RepositoryLister for ZypperLister {
    fn list_repositories(&self) -> Result<Vec<RepositoryReference>> {
        let output = Command::new(&self.command)
            .args(["-x", "lr"])
            .output()
            .with_context(|| format!("Failed to execute '{} -x lr'", self.command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} -x lr failed: {}", self.command, stderr.trim());
        }

        let xml = String::from_utf8_lossy(&output.stdout);
        let repos = parse_repository_list(&xml)
            .with_context(|| format!("Failed to parse output of '{} -x lr'", self.command))?;
        debug!(count = repos.len(), "configured repositories");
        Ok(repos)
    }
}

/// Collect the compressed primary documents of the requested repositories.
///
/// A file is selected when its name ends with `suffix` and the directory
/// holding it (relative to `root`) contains one of the repository names.
/// Entries that cannot be read are logged and skipped.
pub fn find_metadata_files(
    root: &Path,
    suffix: &str,
    repositories: &[String],
) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        warn!(root = %root.display(), "metadata cache root does not exist");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable cache entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy();
        if !file_name.ends_with(suffix) {
            continue;
        }

        let dir = path.parent().unwrap_or(root);
        let relative = dir.strip_prefix(root).unwrap_or(dir);
        let dir_str = relative.to_string_lossy();
        if repositories.iter().any(|repo| dir_str.contains(repo.as_str())) {
            debug!(path = %path.display(), "found metadata file");
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Parse the XML emitted by `zypper -x lr`.
///
/// Every `<repo>` element contributes its `alias` attribute and the text of
/// its first `<url>` child; further base URLs are ignored. Repositories
/// without a URL are skipped.
pub fn parse_repository_list(xml: &str) -> Result<Vec<RepositoryReference>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut repos = Vec::new();
    let mut depth = 0usize;
    let mut saw_root = false;
    // (alias, depth of the <repo> element, collected url)
    let mut current: Option<(String, usize, Option<String>)> = None;
    let mut in_url = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                saw_root = true;
                match e.local_name().as_ref() {
                    b"repo" => {
                        let alias = match e.try_get_attribute("alias")? {
                            Some(attr) => attr.unescape_value()?.into_owned(),
                            None => bail!("<repo> element without alias attribute"),
                        };
                        current = Some((alias, depth, None));
                    }
                    b"url" => {
                        in_url = matches!(&current, Some((_, d, None)) if depth == d + 1);
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                saw_root = true;
                if e.local_name().as_ref() == b"repo" {
                    if let Some(attr) = e.try_get_attribute("alias")? {
                        debug!(alias = %attr.unescape_value()?, "repository has no url");
                    }
                }
            }
            Event::Text(t) if in_url => {
                if let Some((_, _, url)) = current.as_mut() {
                    url.get_or_insert_with(String::new)
                        .push_str(t.unescape()?.as_ref());
                }
            }
            Event::CData(c) if in_url => {
                if let Some((_, _, url)) = current.as_mut() {
                    url.get_or_insert_with(String::new)
                        .push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(e) => {
                match e.local_name().as_ref() {
                    b"url" => in_url = false,
                    b"repo" => {
                        if let Some((alias, _, url)) = current.take() {
                            match url {
                                Some(url) => repos.push(RepositoryReference { alias, url }),
                                None => debug!(%alias, "repository has no url"),
                            }
                        }
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        bail!("repository listing is not an XML document");
    }
    if depth != 0 {
        bail!("repository listing ended with {} unclosed element(s)", depth);
    }

    Ok(repos)
}

/// Find the repository a cache file belongs to.
///
/// The repository whose alias occurs in the file's path is chosen; when
/// several aliases occur, the longest wins, and among equally long aliases
/// the one listed last.
pub fn mirror_for<'a>(
    path: &Path,
    repositories: &'a [RepositoryReference],
) -> Option<&'a RepositoryReference> {
    let path_str = path.to_string_lossy();
    repositories
        .iter()
        .filter(|repo| !repo.alias.is_empty() && path_str.contains(repo.alias.as_str()))
        .max_by_key(|repo| repo.alias.len())
}
