//! Partial download of package headers.
//!
//! Only the start of a package file is requested: bytes `0..=end` of the
//! header range. The header cannot be parsed on its own, it needs the lead
//! and signature header in front of it.

use anyhow::{bail, Context, Result};
use reqwest::header::RANGE;
use reqwest::StatusCode;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::models::HeaderRange;

/// Retrieves the leading bytes of a package file.
pub trait HeaderSource {
    fn fetch(&self, url: &str, range: HeaderRange) -> Result<Vec<u8>>;
}

/// Join a mirror base URL and a package location with a single `/`.
pub fn package_url(base: &str, location: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        location.trim_start_matches('/')
    )
}

/// `Range` header value covering the file from its first byte through the
/// end of the header region (inclusive).
pub fn range_header(range: HeaderRange) -> String {
    format!("bytes=0-{}", range.end)
}

/// Fetches header bytes over HTTP(S) with a single range request.
pub struct HttpHeaderSource {
    client: reqwest::blocking::Client,
}

impl HttpHeaderSource {
    pub fn new() -> Result<Self> {
        Self::with_builder(reqwest::blocking::Client::builder())
    }

    fn with_builder(builder: reqwest::blocking::ClientBuilder) -> Result<Self> {
        let client = builder
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .with_context(|| "Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl HeaderSource for HttpHeaderSource {
    fn fetch(&self, url: &str, range: HeaderRange) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .header(RANGE, range_header(range))
            .send()
            .with_context(|| format!("Failed to fetch {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("GET {} failed (HTTP {})", url, status);
        }
        if status != StatusCode::PARTIAL_CONTENT {
            debug!(%url, %status, "server ignored range request");
        }

        let body = resp
            .bytes()
            .with_context(|| format!("Failed to read response body from {}", url))?;
        debug!(%url, bytes = body.len(), "fetched header");
        Ok(body.to_vec())
    }
}

/// The file fetched header bytes pass through before parsing.
///
/// Each [`store`](ScratchFile::store) overwrites the previous contents. The
/// file is removed when the `ScratchFile` is dropped, provided it was written.
pub struct ScratchFile {
    path: PathBuf,
    written: bool,
}

impl ScratchFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            written: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file contents with `bytes` and reopen it for reading.
    pub fn store(&mut self, bytes: &[u8]) -> Result<File> {
        let mut file = File::create(&self.path)
            .with_context(|| format!("Failed to create scratch file: {}", self.path.display()))?;
        self.written = true;
        file.write_all(bytes)
            .and_then(|_| file.flush())
            .with_context(|| format!("Failed to write scratch file: {}", self.path.display()))?;
        drop(file);

        File::open(&self.path)
            .with_context(|| format!("Failed to reopen scratch file: {}", self.path.display()))
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if self.written {
            let _ = fs::remove_file(&self.path);
        }
    }
}
