//! Advisory launch lock.
//!
//! `SingletonLauncher::ensure_running` does not serialize separate
//! invocations: two logins racing each other can both see "not running" and
//! both launch. Callers that need strict singleton behavior hold a
//! `LaunchLock` around the call.

use crate::error::{Result, WardenError};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// An exclusive advisory lock on a file, released on drop.
#[derive(Debug)]
pub struct LaunchLock {
    file: File,
    path: PathBuf,
}

impl LaunchLock {
    /// Block until the lock at `path` is held.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = open_lock_file(path)?;

        debug!("Waiting for launch lock {}", path.display());
        FileExt::lock_exclusive(&file).map_err(|e| WardenError::io_with_path(e, path))?;
        debug!("Acquired launch lock {}", path.display());

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Take the lock only if nobody else holds it.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let file = open_lock_file(path)?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                debug!("Launch lock {} is held elsewhere", path.display());
                Ok(None)
            }
            Err(e) => Err(WardenError::io_with_path(e, path)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LaunchLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release launch lock {}: {}", self.path.display(), e);
        }
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| WardenError::io_with_path(e, parent))?;
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| WardenError::io_with_path(e, path))
}
