//! Changelog assembly and output.

use chrono::{DateTime, Local};
use std::io::{self, Write};
use tracing::warn;

use crate::models::{Changelog, ChangelogEntry};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Zip the parallel header arrays into entries, keeping header order.
pub fn entries(changelog: Changelog) -> Vec<ChangelogEntry> {
    let Changelog {
        names,
        times,
        texts,
    } = changelog;
    if names.len() != times.len() || names.len() != texts.len() {
        warn!(
            names = names.len(),
            times = times.len(),
            texts = texts.len(),
            "changelog arrays differ in length"
        );
    }
    names
        .into_iter()
        .zip(times)
        .zip(texts)
        .map(|((name, time), text)| ChangelogEntry { time, name, text })
        .collect()
}

/// Render epoch seconds as local date and time.
pub fn format_timestamp(secs: i64) -> String {
    match DateTime::from_timestamp(secs, 0) {
        Some(utc) => utc.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string(),
        None => secs.to_string(),
    }
}

/// Print one `* <time> - <name>` line per entry, each followed by the
/// entry text when `verbose` is set.
pub fn write_entries<W: Write>(
    out: &mut W,
    entries: &[ChangelogEntry],
    verbose: bool,
) -> io::Result<()> {
    for entry in entries {
        writeln!(out, "* {} - {}", format_timestamp(entry.time), entry.name)?;
        if verbose {
            writeln!(out, "{}", entry.text)?;
        }
    }
    Ok(())
}
