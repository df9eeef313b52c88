//! Content provider backed by a host directory.

use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use appfuse::ContentProvider;

/// Serves inode `n` from the file `<root>/n`.
pub struct DirectoryProvider {
    root: PathBuf,
}

impl DirectoryProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, inode: u32) -> PathBuf {
        self.root.join(inode.to_string())
    }
}

impl ContentProvider for DirectoryProvider {
    fn get_file_size(&self, inode: u32) -> i64 {
        match std::fs::metadata(self.path(inode)) {
            Ok(meta) if meta.is_file() => i64::try_from(meta.len()).unwrap_or(-1),
            _ => -1,
        }
    }

    fn get_object_bytes(&self, inode: u32, offset: u64, size: u32) -> Option<Vec<u8>> {
        let path = self.path(inode);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!("failed to open {}: {}", path.display(), e);
                return None;
            }
        };

        let mut buf = vec![0u8; size as usize];
        if let Err(e) = file.read_exact_at(&mut buf, offset) {
            tracing::warn!(
                "failed to read {} bytes at {} from {}: {}",
                size,
                offset,
                path.display(),
                e
            );
            return None;
        }
        Some(buf)
    }
}
