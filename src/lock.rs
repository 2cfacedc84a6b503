use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

pub const LOCK_FILE: &str = "lock";

/// Cooperative single-writer lock for an index directory.
///
/// The lock is a zero-byte sentinel file: it is held while the file exists,
/// by whichever instance created it. Instances that find it held by someone
/// else must not write. Only the owner removes the file.
#[derive(Debug)]
pub struct WriterLock {
    path: PathBuf,
    owned: bool,
}

impl WriterLock {
    /// Creates a handle for the lock file in `dir` without acquiring it.
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(LOCK_FILE),
            owned: false,
        }
    }

    /// Whether any instance, this one included, holds the lock.
    pub fn is_held(&self) -> bool {
        self.path.exists()
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Whether the lock is held by another instance.
    pub fn is_held_elsewhere(&self) -> bool {
        !self.owned && self.is_held()
    }

    /// Tries to take the lock. Returns `Ok(false)` if another instance holds
    /// it; acquiring a lock this instance already owns succeeds.
    pub fn acquire(&mut self) -> io::Result<bool> {
        if self.owned {
            return Ok(true);
        }

        match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(_) => {
                self.owned = true;
                tracing::debug!(path = %self.path.display(), "Writer lock acquired");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Removes the lock file if this instance owns it.
    pub fn release(&mut self) -> io::Result<()> {
        if !self.owned {
            return Ok(());
        }
        crate::durable::remove_if_exists(&self.path)?;
        self.owned = false;
        tracing::debug!(path = %self.path.display(), "Writer lock released");
        Ok(())
    }

    /// Location of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release writer lock");
        }
    }
}
