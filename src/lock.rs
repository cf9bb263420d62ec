//! Exclusive lock on a source tree.
//!
//! configure writes `configure.wrf` and friends into the tree and compile
//! reads them back, so two orchestrators on the same tree would corrupt each
//! other. The lock is advisory and held for as long as the guard lives.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

pub const LOCK_FILENAME: &str = ".wrf-builder.lock";

#[derive(Debug)]
pub struct SourceTreeLock {
    _file: File,
    path: PathBuf,
}

impl SourceTreeLock {
    /// Take the lock for `source_dir`, failing immediately if it is held.
    pub fn acquire(source_dir: &Path) -> Result<Self> {
        let lock_path = source_dir.join(LOCK_FILENAME);

        // Never unlink the lock file: a second process could then create a
        // fresh inode at the same path and lock that one as well.
        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to create lock file: {}", lock_path.display()))?;

        if lock_file.try_lock_exclusive().is_err() {
            drop(lock_file);
            return Err(anyhow::anyhow!(
                "Source tree is being configured or built by another process: {}",
                lock_path.display()
            ));
        }

        Ok(Self {
            _file: lock_file,
            path: lock_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
