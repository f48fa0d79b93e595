//! Reading changelog tags out of an RPM package header.
//!
//! A package file starts with the lead, followed by the signature header and
//! the main header. `rpm::PackageMetadata` decodes those three and stops
//! before the payload, so a prefix of the package file that covers the
//! header region is enough.

use std::io::BufRead;

use crate::models::Changelog;

/// Header decoding error.
#[derive(Debug)]
pub enum HeaderError {
    Malformed(rpm::Error),
    Changelog(rpm::Error),
}

impl std::fmt::Display for HeaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeaderError::Malformed(e) => write!(f, "malformed package header: {}", e),
            HeaderError::Changelog(e) => write!(f, "unreadable changelog tags: {}", e),
        }
    }
}

impl std::error::Error for HeaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HeaderError::Malformed(e) | HeaderError::Changelog(e) => Some(e),
        }
    }
}

/// Decode the changelog name, time and text arrays from a package file.
///
/// A header without changelog tags yields an empty changelog.
pub fn parse_changelog<R: BufRead>(mut r: R) -> Result<Changelog, HeaderError> {
    let metadata = rpm::PackageMetadata::parse(&mut r).map_err(HeaderError::Malformed)?;
    let entries = metadata
        .get_changelog_entries()
        .map_err(HeaderError::Changelog)?;

    let mut changelog = Changelog::default();
    for entry in entries {
        changelog.names.push(entry.name);
        changelog
            .times
            .push(i64::try_from(entry.timestamp).unwrap_or(i64::MAX));
        changelog.texts.push(entry.description);
    }
    Ok(changelog)
}
