//! Mutual exclusion for deployment runs.
//!
//! An exclusive advisory flock held for the whole run. A second operator
//! invoking the sequencer while a run is in flight gets `LockHeld`
//! immediately instead of interleaving mutations.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use tracing::debug;

use crate::error::DeployError;

/// Held deployment lock; released on drop.
#[derive(Debug)]
pub struct DeployLock {
    _flock: Flock<File>,
    path: PathBuf,
}

impl DeployLock {
    /// Acquire the lock, failing fast if another run holds it.
    pub fn acquire(path: &Path) -> Result<Self, DeployError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(flock) => {
                debug!(path = %path.display(), "deployment lock acquired");
                Ok(Self {
                    _flock: flock,
                    path: path.to_path_buf(),
                })
            }
            Err((_file, Errno::EAGAIN)) => Err(DeployError::LockHeld {
                path: path.to_path_buf(),
            }),
            Err((_file, errno)) => Err(DeployError::Io(std::io::Error::from_raw_os_error(
                errno as i32,
            ))),
        }
    }

    /// The lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
