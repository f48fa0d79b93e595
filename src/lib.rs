//! # rpm-changelog
//!
//! Lists the changelogs of RPM packages available in zypp repositories
//! without downloading or installing the packages.
//!
//! zypp keeps each repository's primary metadata in a local cache. That
//! document records, for every package, where its RPM header sits inside
//! the package file. Fetching just that prefix with an HTTP range request is
//! enough to read the changelog tags.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌─────────────┐   ┌──────────┐
//! │ zypp cache │──▶│ primary.xml  │──▶│ Range: 0-N  │──▶│  header  │──▶ stdout
//! │ zypper lr  │   │ name filter  │   │  (mirror)   │   │ changelog│
//! └────────────┘   └──────────────┘   └─────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rpm-changelog --package vim                  # changelog of vim in repo-oss
//! rpm-changelog -e -p 'kernel-' -r repo-oss,repo-update -v
//! rpm-changelog --all --repositories repo-update
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Optional TOML configuration |
//! | [`models`] | Core data types |
//! | [`filter`] | Package name selection |
//! | [`repos`] | Metadata cache discovery and repository listing |
//! | [`metadata`] | Primary metadata decoding |
//! | [`fetch`] | Range requests and the scratch file |
//! | [`header`] | RPM header changelog tags |
//! | [`changelog`] | Changelog formatting |
//! | [`pipeline`] | Stage orchestration |

pub mod changelog;
pub mod config;
pub mod fetch;
pub mod filter;
pub mod header;
pub mod metadata;
pub mod models;
pub mod pipeline;
pub mod repos;
