//! Advisory `flock`-based locks on files inside a lock directory.
//!
//! Used to serialize access to a shared on-disk resource (such as one
//! cached repository) across processes.

use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use crate::{
    error::{LockError, LockResult},
    fs::{ensure_dir_exists, sanitize_file_name},
};

/// An exclusive lock held on `<dir>/<name>.lock`.
///
/// The lock is released when `FileLock` is dropped.
pub struct FileLock {
    _file: nix::fcntl::Flock<File>,
    path: PathBuf,
}

impl FileLock {
    fn lock_path(dir: &Path, name: &str) -> LockResult<PathBuf> {
        ensure_dir_exists(dir).map_err(|err| LockError::AcquireFailed(err.to_string()))?;
        Ok(dir.join(format!("{}.lock", sanitize_file_name(name))))
    }

    fn open(path: &Path) -> LockResult<File> {
        Ok(OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?)
    }

    /// Acquires an exclusive lock, blocking until it is available.
    pub fn acquire<P: AsRef<Path>>(dir: P, name: &str) -> LockResult<Self> {
        let lock_path = Self::lock_path(dir.as_ref(), name)?;
        let file = Self::open(&lock_path)?;

        let file = nix::fcntl::Flock::lock(file, nix::fcntl::FlockArg::LockExclusive).map_err(
            |(_, err)| LockError::AcquireFailed(format!("{}: {}", lock_path.display(), err)),
        )?;

        Ok(FileLock {
            path: lock_path,
            _file: file,
        })
    }

    /// Tries to acquire an exclusive lock without blocking.
    ///
    /// Returns `None` if the lock is already held elsewhere.
    pub fn try_acquire<P: AsRef<Path>>(dir: P, name: &str) -> LockResult<Option<Self>> {
        let lock_path = Self::lock_path(dir.as_ref(), name)?;
        let file = Self::open(&lock_path)?;

        match nix::fcntl::Flock::lock(file, nix::fcntl::FlockArg::LockExclusiveNonblock) {
            Ok(file) => {
                Ok(Some(FileLock {
                    path: lock_path,
                    _file: file,
                }))
            }
            Err((_, nix::errno::Errno::EWOULDBLOCK)) => Ok(None),
            Err((_, err)) => {
                Err(LockError::AcquireFailed(format!(
                    "{}: {}",
                    lock_path.display(),
                    err
                )))
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_lock_path_sanitized() {
        let dir = tempdir().unwrap();
        let lock = FileLock::acquire(dir.path(), "https://repo/a").unwrap();
        assert_eq!(lock.path(), dir.path().join("https_repo_a.lock"));
    }

    #[test]
    fn test_lock_dir_created() {
        let dir = tempdir().unwrap();
        let locks = dir.path().join(".locks");
        let _lock = FileLock::acquire(&locks, "repo").unwrap();
        assert!(locks.is_dir());
    }

    #[test]
    fn test_exclusive_lock() {
        let dir = tempdir().unwrap();
        let lock1 = FileLock::acquire(dir.path(), "exclusive").unwrap();

        let lock2 = FileLock::try_acquire(dir.path(), "exclusive").unwrap();
        assert!(lock2.is_none());

        drop(lock1);

        let lock3 = FileLock::try_acquire(dir.path(), "exclusive").unwrap();
        assert!(lock3.is_some());
    }

    #[test]
    fn test_different_names_do_not_conflict() {
        let dir = tempdir().unwrap();
        let lock1 = FileLock::acquire(dir.path(), "repo-a").unwrap();
        let lock2 = FileLock::acquire(dir.path(), "repo-b").unwrap();
        assert_ne!(lock1.path(), lock2.path());
    }

    #[test]
    fn test_lock_blocks_until_released() {
        let dir = tempdir().unwrap();
        let lock1 = FileLock::acquire(dir.path(), "block").unwrap();
        let path = lock1.path().to_path_buf();
        let lock_dir = dir.path().to_path_buf();

        let handle = thread::spawn(move || {
            let lock2 = FileLock::acquire(&lock_dir, "block").unwrap();
            assert_eq!(lock2.path(), path);
        });

        thread::sleep(Duration::from_millis(100));
        drop(lock1);

        handle.join().unwrap();
    }
}
