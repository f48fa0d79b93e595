//! Package name selection.
//!
//! Pattern mode anchors the expression at the start of the name only, so
//! `kernel` selects `kernel-default` as well as `kernel`.

use anyhow::{Context, Result};
use regex::Regex;

#[derive(Debug, Clone)]
pub enum PackageFilter {
    /// Every package is selected.
    All,
    /// Exact string equality on the package name.
    Exact(String),
    /// Regular expression matched at the start of the name.
    Pattern(Regex),
    /// No package name was given, so nothing is selected.
    Nothing,
}

impl PackageFilter {
    pub fn new(all: bool, expression: bool, package: Option<&str>) -> Result<Self> {
        if all {
            return Ok(Self::All);
        }
        let Some(package) = package else {
            return Ok(Self::Nothing);
        };
        if expression {
            let anchored = format!("^(?:{})", package);
            let re = Regex::new(&anchored)
                .with_context(|| format!("Invalid package expression: '{}'", package))?;
            Ok(Self::Pattern(re))
        } else {
            Ok(Self::Exact(package.to_string()))
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Exact(wanted) => wanted == name,
            Self::Pattern(re) => re.is_match(name),
            Self::Nothing => false,
        }
    }
}
