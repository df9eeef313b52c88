//! The `serve` command - serves a directory over an inherited FUSE descriptor.

use std::os::fd::{BorrowedFd, RawFd};
use std::path::PathBuf;

use clap::Args;
use nix::fcntl::{FcntlArg, fcntl};

use crate::config::{FileConfig, Settings};
use crate::provider::DirectoryProvider;

#[derive(Args)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Open FUSE device descriptor inherited from the parent process
    #[arg(long)]
    pub fd: Option<RawFd>,

    /// Directory holding the files, named by inode number
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Log filter directives (e.g. "appfuse=debug")
    #[arg(long)]
    pub log_filter: Option<String>,
}

impl ServeArgs {
    pub fn settings(self) -> anyhow::Result<Settings> {
        let file = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Settings::resolve(file, self.fd, self.root, self.log_filter)
    }
}

pub fn run(settings: Settings) -> anyhow::Result<()> {
    fcntl(settings.fd, FcntlArg::F_GETFD)
        .map_err(|e| anyhow::anyhow!("fd {} is not open: {}", settings.fd, e))?;
    // SAFETY: the descriptor was just checked to be open, and it is owned by
    // this process for its whole lifetime.
    let fd = unsafe { BorrowedFd::borrow_raw(settings.fd) };

    let provider = DirectoryProvider::new(settings.root);
    tracing::info!(
        "serving {} on fd {}",
        provider.root().display(),
        settings.fd
    );

    if !appfuse::start_app_fuse_loop(fd, provider) {
        anyhow::bail!("FUSE device went away");
    }

    tracing::info!("FUSE session finished");
    Ok(())
}
