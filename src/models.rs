//! Core data models used throughout rpm-changelog.
//!
//! These types carry repository, package, and changelog information between
//! the stages of the pipeline. None of them outlive a single invocation.

/// A configured repository: its zypp alias and the base URL packages are
/// downloaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryReference {
    pub alias: String,
    pub url: String,
}

/// Byte offsets of the RPM header region inside a remote package file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderRange {
    pub start: u64,
    pub end: u64,
}

/// A package entry from a repository's primary metadata document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: String,
    pub arch: Option<String>,
    pub version: Option<String>,
    /// Download path relative to the repository's base URL.
    pub location: String,
    pub header_ranges: Vec<HeaderRange>,
}

/// Changelog tags as stored in an RPM header: three parallel arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changelog {
    pub names: Vec<String>,
    pub times: Vec<i64>,
    pub texts: Vec<String>,
}

/// One changelog entry, in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogEntry {
    pub time: i64,
    pub name: String,
    pub text: String,
}
