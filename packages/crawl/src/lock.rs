//! Single-instance guard backed by a PID file.
//!
//! The lock file holds the decimal process ID of its owner. Its mtime is
//! the staleness clock: a file older than the configured threshold is
//! treated as abandoned and replaced regardless of its contents.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Errors from acquiring the process lock.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// A live process other than this one owns the lock.
    #[error("Another crawl is already running (PID {pid}); lock file {path}")]
    Held {
        /// PID stored in the lock file.
        pid: u32,
        /// Path of the lock file.
        path: PathBuf,
    },

    /// The lock file could not be created, removed or written.
    #[error("Failed to update lock file {path}: {source}")]
    Io {
        /// Path of the lock file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Returns `true` if a process with `pid` exists.
///
/// `kill(pid, 0)` sends no signal; `EPERM` still means the process exists
/// but belongs to another user.
#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs only the existence and permission check.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

/// Returns `true` if the file at `path` was last modified longer than
/// `stale_after` ago.
fn is_stale(path: &Path, stale_after: Duration) -> bool {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > stale_after)
}

/// Held process lock. The lock file is removed on drop if this process
/// still owns it.
#[derive(Debug)]
pub struct ProcessLock {
    path: PathBuf,
    pid: u32,
    released: bool,
}

impl ProcessLock {
    /// Acquires the lock at `path` for the current process.
    ///
    /// A missing file is created. An existing file is replaced when it is
    /// older than `stale_after`, unparseable, or names a dead process. A
    /// file naming this process is re-entered.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Held`] if another live process owns the lock
    /// and [`LockError::Io`] if the lock file cannot be written.
    pub fn acquire(path: &Path, stale_after: Duration) -> Result<Self, LockError> {
        let pid = std::process::id();
        let io_err = |source: std::io::Error| LockError::Io {
            path: path.to_path_buf(),
            source,
        };

        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                writeln!(file, "{pid}").map_err(io_err)?;
                log::debug!("Created lock file {} (PID {pid})", path.display());
                return Ok(Self::owned(path, pid));
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(io_err(e)),
        }

        if is_stale(path, stale_after) {
            log::warn!(
                "Lock file {} is older than {}s, removing it",
                path.display(),
                stale_after.as_secs()
            );
            std::fs::remove_file(path).map_err(io_err)?;
        } else {
            let contents = std::fs::read_to_string(path).unwrap_or_default();
            match contents.trim().parse::<u32>() {
                Ok(owner) if owner == pid => {
                    log::debug!("Lock file {} already owned by this process", path.display());
                }
                Ok(owner) if process_alive(owner) => {
                    return Err(LockError::Held {
                        pid: owner,
                        path: path.to_path_buf(),
                    });
                }
                Ok(owner) => {
                    log::warn!("Lock owner PID {owner} is not running, taking over the lock");
                }
                Err(_) => {
                    log::warn!(
                        "Lock file {} does not hold a PID, taking over the lock",
                        path.display()
                    );
                }
            }
        }

        std::fs::write(path, format!("{pid}\n")).map_err(io_err)?;
        Ok(Self::owned(path, pid))
    }

    fn owned(path: &Path, pid: u32) -> Self {
        Self {
            path: path.to_path_buf(),
            pid,
            released: false,
        }
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the lock file now instead of on drop.
    pub fn release(mut self) {
        self.remove_if_owned();
    }

    fn remove_if_owned(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                log::warn!("Failed to read lock file {}: {e}", self.path.display());
                return;
            }
        };

        match contents.trim().parse::<u32>() {
            Ok(owner) if owner == self.pid => {
                if let Err(e) = std::fs::remove_file(&self.path) {
                    log::warn!("Failed to remove lock file {}: {e}", self.path.display());
                } else {
                    log::debug!("Released lock file {}", self.path.display());
                }
            }
            _ => {
                log::warn!(
                    "Lock file {} is no longer owned by this process, leaving it in place",
                    self.path.display()
                );
            }
        }
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        self.remove_if_owned();
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use super::*;

    const HOUR: Duration = Duration::from_secs(3_600);

    fn lock_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("koopi.lock")
    }

    fn age(path: &Path, by: Duration) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - by)
            .unwrap();
    }

    #[test]
    fn creates_lock_with_own_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);

        let lock = ProcessLock::acquire(&path, HOUR).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());

        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn refuses_lock_held_by_live_process() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);
        std::fs::write(&path, "1\n").unwrap();

        let err = ProcessLock::acquire(&path, HOUR).unwrap_err();
        assert!(matches!(err, LockError::Held { pid: 1, .. }));
        assert_eq!(
            err.to_string(),
            format!(
                "Another crawl is already running (PID 1); lock file {}",
                path.display()
            )
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1\n");
    }

    #[test]
    fn replaces_stale_lock_even_if_owner_is_alive() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);
        std::fs::write(&path, "1\n").unwrap();
        age(&path, 2 * HOUR);

        let _lock = ProcessLock::acquire(&path, HOUR).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    #[cfg(unix)]
    #[test]
    fn stale_lock_that_cannot_be_removed_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);
        // A directory in place of the lock file: exists, ages, can't be unlinked.
        std::fs::create_dir(&path).unwrap();
        File::open(&path)
            .unwrap()
            .set_modified(SystemTime::now() - 2 * HOUR)
            .unwrap();

        let result = ProcessLock::acquire(&path, HOUR);
        assert!(matches!(result, Err(LockError::Io { .. })));
        assert!(path.is_dir());
    }

    #[test]
    fn takes_over_lock_of_dead_process() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);
        // Above any kernel pid_max, so never a live process.
        std::fs::write(&path, format!("{}\n", i32::MAX)).unwrap();

        assert!(ProcessLock::acquire(&path, HOUR).is_ok());
    }

    #[test]
    fn takes_over_unparseable_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);
        std::fs::write(&path, "not a pid").unwrap();

        assert!(ProcessLock::acquire(&path, HOUR).is_ok());
    }

    #[test]
    fn reenters_own_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);
        std::fs::write(&path, format!("{}\n", std::process::id())).unwrap();

        let lock = ProcessLock::acquire(&path, HOUR).unwrap();
        lock.release();
        assert!(!path.exists());
    }

    #[test]
    fn release_leaves_foreign_lock_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);

        let lock = ProcessLock::acquire(&path, HOUR).unwrap();
        std::fs::write(&path, "1\n").unwrap();
        drop(lock);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1\n");
    }

    #[test]
    fn process_probe() {
        assert!(process_alive(std::process::id()));
        assert!(!process_alive(0));
        assert!(!process_alive(u32::MAX));
    }
}
