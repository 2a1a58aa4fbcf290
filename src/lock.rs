//! Interprocess mutual exclusion on a lock file
//!
//! Runner processes sharing one cloud project serialize on an exclusive
//! `flock(2)` of a file in the lock directory. The lock belongs to the open
//! file, so it is released on [`FileLock::release`], on drop, or when the
//! process dies.

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{flock, FlockArg};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("failed to open lock file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("lock {} is held by another process", path.display())]
    Busy { path: PathBuf },

    #[error("flock on {} failed: {source}", path.display())]
    Flock {
        path: PathBuf,
        #[source]
        source: Errno,
    },

    #[error("lock task for {} did not complete: {message}", path.display())]
    Interrupted { path: PathBuf, message: String },
}

/// Exclusive hold on a lock file
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    file: Option<File>,
}

impl FileLock {
    /// Block until the lock is obtained
    ///
    /// The blocking `flock` runs on tokio's blocking pool.
    pub async fn acquire(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let path = path.as_ref().to_path_buf();
        let file = open(&path)?;
        debug!(path = %path.display(), "Waiting for lock");

        let task_path = path.clone();
        let file = tokio::task::spawn_blocking(move || {
            flock(file.as_raw_fd(), FlockArg::LockExclusive)
                .map(|()| file)
                .map_err(|source| LockError::Flock {
                    path: task_path,
                    source,
                })
        })
        .await
        .map_err(|e| LockError::Interrupted {
            path: path.clone(),
            message: e.to_string(),
        })??;

        info!(path = %path.display(), "Lock acquired");
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    /// Take the lock only if nobody holds it
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let path = path.as_ref().to_path_buf();
        let file = open(&path)?;

        match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
            Ok(()) => {
                info!(path = %path.display(), "Lock acquired");
                Ok(Self {
                    path,
                    file: Some(file),
                })
            }
            Err(Errno::EWOULDBLOCK) => Err(LockError::Busy { path }),
            Err(source) => Err(LockError::Flock { path, source }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release explicitly, reporting any unlock error
    pub fn release(mut self) -> Result<(), LockError> {
        match self.file.take() {
            Some(file) => unlock(&self.path, &file),
            None => Ok(()),
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = unlock(&self.path, &file) {
                // closing the file below drops the lock anyway
                warn!(error = %e, "Unlock on drop failed");
            }
        }
    }
}

fn open(path: &Path) -> Result<File, LockError> {
    let to_open_error = |source| LockError::Open {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(to_open_error)?;
    }
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .map_err(to_open_error)
}

fn unlock(path: &Path, file: &File) -> Result<(), LockError> {
    flock(file.as_raw_fd(), FlockArg::Unlock).map_err(|source| LockError::Flock {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "Lock released");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_try_acquire_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default_project.lock");

        let held = FileLock::try_acquire(&path).unwrap();
        assert!(matches!(
            FileLock::try_acquire(&path),
            Err(LockError::Busy { .. })
        ));

        held.release().unwrap();
        FileLock::try_acquire(&path).unwrap();
    }

    #[test]
    fn test_drop_releases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("x.lock");

        {
            let _held = FileLock::try_acquire(&path).unwrap();
        }
        let again = FileLock::try_acquire(&path).unwrap();
        assert_eq!(again.path(), path);
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.lock");
        let held = FileLock::try_acquire(&path).unwrap();
        let released = Arc::new(AtomicBool::new(false));

        let waiter = {
            let path = path.clone();
            let released = released.clone();
            tokio::spawn(async move {
                let lock = FileLock::acquire(&path).await.unwrap();
                assert!(released.load(Ordering::SeqCst));
                lock
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        released.store(true, Ordering::SeqCst);
        held.release().unwrap();

        let lock = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lock.path(), path);
    }
}
