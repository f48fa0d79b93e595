use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Root of zypp's raw metadata cache.
    #[serde(default = "default_cache_root")]
    pub cache_root: PathBuf,
    /// File name suffix of the compressed primary metadata documents.
    #[serde(default = "default_metadata_suffix")]
    pub metadata_suffix: String,
    /// Where fetched header bytes are written before parsing.
    #[serde(default = "default_scratch_file")]
    pub scratch_file: PathBuf,
    /// Package manager executable queried for configured repositories.
    #[serde(default = "default_zypper_command")]
    pub zypper_command: String,
}

fn default_cache_root() -> PathBuf {
    PathBuf::from("/var/cache/zypp/raw/")
}
fn default_metadata_suffix() -> String {
    "primary.xml.gz".to_string()
}
fn default_scratch_file() -> PathBuf {
    PathBuf::from("temp_header.rpm")
}
fn default_zypper_command() -> String {
    "zypper".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_root: default_cache_root(),
            metadata_suffix: default_metadata_suffix(),
            scratch_file: default_scratch_file(),
            zypper_command: default_zypper_command(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;

    Ok(config)
}

/// Load the config file if one was given, otherwise fall back to defaults.
pub fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path),
        None => Ok(Config::default()),
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.metadata_suffix.is_empty() {
        anyhow::bail!("metadata_suffix must not be empty");
    }
    if config.scratch_file.as_os_str().is_empty() {
        anyhow::bail!("scratch_file must not be empty");
    }
    if config.zypper_command.trim().is_empty() {
        anyhow::bail!("zypper_command must not be empty");
    }
    Ok(())
}
