//! Cross-process mutual exclusion over cache resources.
//!
//! Installers running in different processes coordinate through an advisory
//! lock on a `.lck` sidecar next to the protected resource. The lock is held
//! for the duration of a caller-supplied task and released when the guard is
//! dropped, whether the task succeeds, fails, or panics.

use crate::cache_paths::lock_file_for;
use crate::error::{InstallerError, Result};
use fs2::FileExt;
use log::{debug, info, warn};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Default upper bound on how long to wait for another installer.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(120);

/// Default pause between lock attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How long to wait for a lock and how often to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Give up after this long.
    pub timeout: Duration,
    /// Sleep this long between attempts.
    pub poll_interval: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_LOCK_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// A held lock. Unlocks and closes the sidecar exactly once, on drop.
struct LockGuard {
    file: File,
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!("failed to release lock {}: {err}", self.path.display());
        } else {
            debug!("released lock {}", self.path.display());
        }
    }
}

/// Runs `task` while holding an exclusive lock on `resource`.
///
/// The lock lives in `<resource>.lck`; its parent directory is created when
/// missing. Acquisition is retried every `options.poll_interval` until
/// `options.timeout` has elapsed.
///
/// # Errors
///
/// Returns [`InstallerError::LockTimeout`] if the lock stays busy for longer
/// than the timeout, [`InstallerError::Io`] if the sidecar cannot be
/// created, and otherwise whatever `task` returns.
///
/// # Examples
///
/// ```
/// use antw_installer::lock::{LockOptions, with_lock};
///
/// let dir = tempfile::tempdir()?;
/// let resource = dir.path().join("cache").join("tool.zip");
/// let answer = with_lock(&resource, LockOptions::default(), || Ok(42))?;
/// assert_eq!(answer, 42);
/// assert!(dir.path().join("cache").join("tool.zip.lck").exists());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn with_lock<T, F>(resource: &Path, options: LockOptions, task: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let guard = acquire(resource, options)?;
    let outcome = task();
    drop(guard);
    outcome
}

fn acquire(resource: &Path, options: LockOptions) -> Result<LockGuard> {
    let path = lock_file_for(resource);
    let file = open_lock_file(&path)?;

    let started = Instant::now();
    let mut announced = false;
    loop {
        if file.try_lock_exclusive().is_ok() {
            debug!("acquired lock {}", path.display());
            return Ok(LockGuard { file, path });
        }
        if started.elapsed() >= options.timeout {
            return Err(InstallerError::LockTimeout {
                resource: resource.to_path_buf(),
                waited: started.elapsed(),
            });
        }
        if !announced {
            info!(
                "waiting for another process to finish installing {}",
                resource.display()
            );
            announced = true;
        }
        std::thread::sleep(options.poll_interval);
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            if !parent.is_dir() {
                return Err(InstallerError::io(
                    format!("failed to create lock directory {}", parent.display()),
                    err,
                ));
            }
        }
    }
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|e| InstallerError::io(format!("failed to open lock file {}", path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    fn short_options() -> LockOptions {
        LockOptions {
            timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(10),
        }
    }

    #[test]
    fn runs_task_and_returns_its_value() {
        let dir = tempfile::tempdir().expect("temp dir");
        let resource = dir.path().join("a").join("b").join("tool.zip");
        let value = with_lock(&resource, short_options(), || Ok("done")).expect("lock");
        assert_eq!(value, "done");
        assert!(lock_file_for(&resource).exists());
    }

    #[test]
    fn times_out_while_lock_is_held_elsewhere() {
        let dir = tempfile::tempdir().expect("temp dir");
        let resource = dir.path().join("tool.zip");
        let holder = open_lock_file(&lock_file_for(&resource)).expect("open");
        holder.lock_exclusive().expect("hold lock");

        let ran = AtomicUsize::new(0);
        let err = with_lock(&resource, short_options(), || {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .expect_err("expected timeout");

        assert!(matches!(err, InstallerError::LockTimeout { ref resource, .. } if resource.ends_with("tool.zip")));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        FileExt::unlock(&holder).expect("unlock");
    }

    #[test]
    fn releases_lock_when_task_fails() {
        let dir = tempfile::tempdir().expect("temp dir");
        let resource = dir.path().join("tool.zip");

        let failed: Result<()> = with_lock(&resource, short_options(), || {
            Err(InstallerError::configuration("boom"))
        });
        assert!(failed.is_err());

        let reacquired = with_lock(&resource, short_options(), || Ok(()));
        assert!(reacquired.is_ok());
    }

    #[test]
    fn releases_lock_when_task_panics() {
        let dir = tempfile::tempdir().expect("temp dir");
        let resource = dir.path().join("tool.zip");

        let panicked = std::panic::catch_unwind(|| {
            let _: Result<()> = with_lock(&resource, short_options(), || panic!("task exploded"));
        });
        assert!(panicked.is_err());

        assert!(with_lock(&resource, short_options(), || Ok(())).is_ok());
    }

    #[test]
    fn serialises_concurrent_holders() {
        let dir = tempfile::tempdir().expect("temp dir");
        let resource = Arc::new(dir.path().join("tool.zip"));
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(4));
        let options = LockOptions {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(5),
        };

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let resource = Arc::clone(&resource);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    with_lock(&resource, options, || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(20));
                        inside.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("thread").expect("lock");
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fails_when_parent_is_a_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let occupied = dir.path().join("occupied");
        std::fs::write(&occupied, b"file").expect("write");
        let resource = occupied.join("tool.zip");

        let err = with_lock(&resource, short_options(), || Ok(())).expect_err("expected failure");
        assert!(matches!(err, InstallerError::Io { .. }));
    }
}
