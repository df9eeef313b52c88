//! Settings for `appfuse serve`: an optional TOML file overridden by flags.

use std::os::fd::RawFd;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Contents of the `--config` file. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub fd: Option<RawFd>,
    pub root: Option<PathBuf>,
    pub log_filter: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Fully resolved settings.
#[derive(Debug, PartialEq)]
pub struct Settings {
    pub fd: RawFd,
    pub root: PathBuf,
    pub log_filter: Option<String>,
}

impl Settings {
    /// Merges flag values over the file values and checks that the
    /// required ones are present.
    pub fn resolve(
        file: FileConfig,
        fd: Option<RawFd>,
        root: Option<PathBuf>,
        log_filter: Option<String>,
    ) -> anyhow::Result<Self> {
        let fd = fd
            .or(file.fd)
            .ok_or_else(|| anyhow::anyhow!("--fd is required"))?;
        if fd < 0 {
            anyhow::bail!("fd must not be negative, got {fd}");
        }

        let root = root
            .or(file.root)
            .ok_or_else(|| anyhow::anyhow!("--root is required"))?;
        if !root.is_dir() {
            anyhow::bail!("not a directory: {}", root.display());
        }

        Ok(Self {
            fd,
            root,
            log_filter: log_filter.or(file.log_filter),
        })
    }
}
