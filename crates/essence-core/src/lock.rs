use crate::error::{ErrorCode, RecipeError};
use fs2::FileExt;
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

/// Advisory lock errors for the file storage directory.
#[derive(Debug)]
pub enum LockError {
    Timeout { path: PathBuf, waited: Duration },
    IoError(io::Error),
}

impl From<io::Error> for LockError {
    fn from(err: io::Error) -> Self {
        Self::IoError(err)
    }
}

impl LockError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::IoError(_) => ErrorCode::StorageFailed,
        }
    }
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { path, waited } => write!(
                f,
                "{}: lock timed out after {:?} at {}",
                self.code(),
                waited,
                path.display()
            ),
            Self::IoError(err) => write!(f, "{}: {}", self.code(), err),
        }
    }
}

impl std::error::Error for LockError {}

impl From<LockError> for RecipeError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Timeout { waited, .. } => Self::LockTimeout(waited),
            LockError::IoError(err) => Self::Storage(err.to_string()),
        }
    }
}

#[derive(Clone, Copy)]
enum LockKind {
    Shared,
    Exclusive,
}

/// RAII guard over the storage directory's lock file.
///
/// Readers take it shared, writers exclusive. Unlocks on drop.
#[derive(Debug)]
pub struct StorageLock {
    file: File,
    path: PathBuf,
}

impl StorageLock {
    pub fn shared(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        Self::acquire(path, timeout, LockKind::Shared)
    }

    pub fn exclusive(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        Self::acquire(path, timeout, LockKind::Exclusive)
    }

    fn acquire(path: &Path, timeout: Duration, kind: LockKind) -> Result<Self, LockError> {
        let parent = path.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "lock path has no parent")
        })?;
        fs::create_dir_all(parent)?;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let start = Instant::now();
        loop {
            let busy = match kind {
                LockKind::Shared => FileExt::try_lock_shared(&file).is_err(),
                LockKind::Exclusive => FileExt::try_lock_exclusive(&file).is_err(),
            };

            if !busy {
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                });
            }

            if start.elapsed() >= timeout {
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    waited: start.elapsed(),
                });
            }

            thread::sleep(Duration::from_millis(10));
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StorageLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::{LockError, StorageLock};
    use crate::error::ErrorCode;
    use std::time::Duration;

    #[test]
    fn shared_locks_are_compatible() -> Result<(), LockError> {
        let dir = tempfile::tempdir().map_err(LockError::IoError)?;
        let path = dir.path().join(".lock");
        let _first = StorageLock::shared(&path, Duration::from_millis(50))?;
        let second = StorageLock::shared(&path, Duration::from_millis(50))?;
        assert_eq!(second.path(), path.as_path());
        Ok(())
    }

    #[test]
    fn exclusive_blocks_readers_until_dropped() -> Result<(), LockError> {
        let dir = tempfile::tempdir().map_err(LockError::IoError)?;
        let path = dir.path().join(".lock");
        {
            let _write = StorageLock::exclusive(&path, Duration::from_millis(50))?;
            let read = StorageLock::shared(&path, Duration::from_millis(20));
            assert!(matches!(read, Err(LockError::Timeout { .. })));
        }
        let _read = StorageLock::shared(&path, Duration::from_millis(50))?;
        Ok(())
    }

    #[test]
    fn timeout_maps_to_lock_contention() {
        let err = LockError::Timeout {
            path: "/tmp/essence/.lock".into(),
            waited: Duration::from_millis(10),
        };
        assert_eq!(err.code(), ErrorCode::LockContention);
        assert!(err.to_string().starts_with("E5002"));
    }
}
