//! Advisory filesystem locking.
//!
//! `DirLock` guards a directory with a sibling `.lock` file created with
//! `O_EXCL` semantics: only one process can hold the lock for a given path
//! at a time. The teacher's retrieval cache used a `DirLock` per downloaded
//! package directory; this crate reuses the same primitive at crate-wide
//! scope, as the single advisory instance lock §5 of the spec calls for
//! (acquired once in `Orchestrator::new`, released on drop).

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use util::errors::{Error, ErrorKind, Res};

#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
    lock_file: PathBuf,
}

impl DirLock {
    /// Acquires an advisory lock on `path`, creating the directory if it
    /// doesn't yet exist. Fails with `Locked` if another lock is already
    /// held.
    pub fn acquire(path: &Path) -> Res<Self> {
        fs::create_dir_all(path)?;
        let lock_file = path.join(".lock");

        match OpenOptions::new().write(true).create_new(true).open(&lock_file) {
            Ok(_) => Ok(DirLock {
                path: path.to_path_buf(),
                lock_file,
            }),
            Err(ref e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(ErrorKind::Locked(path.display().to_string()).into())
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Releases the lock early. Also happens implicitly on drop.
    pub fn release(self) {
        drop(self)
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_file);
    }
}
