//! Advisory file lock that keeps a database file to one handle.
//!
//! The lock lives in a companion `<path>-lock` file so it can be held while
//! the database file itself is replaced or truncated by recovery. Read-only
//! handles take a shared lock, so several readers may coexist but never a
//! reader and a writer.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Path of the file with `suffix` appended to its name.
pub(crate) fn companion_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Path of the rollback journal for a database file.
#[must_use]
pub fn journal_path(path: &Path) -> PathBuf {
    companion_path(path, "-journal")
}

/// Path of the lock file for a database file.
#[must_use]
pub fn lock_path(path: &Path) -> PathBuf {
    companion_path(path, "-lock")
}

/// A held lock; released when dropped.
#[derive(Debug)]
pub(crate) struct FileLock {
    file: File,
}

impl FileLock {
    /// Takes the lock for the database at `db_path` without blocking.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseLocked` if another handle holds a conflicting lock.
    pub(crate) fn acquire(db_path: &Path, shared: bool) -> CoreResult<Self> {
        let path = lock_path(db_path);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let locked = if shared {
            FileExt::try_lock_shared(&file)
        } else {
            FileExt::try_lock_exclusive(&file)
        };
        if locked.is_err() {
            return Err(CoreError::DatabaseLocked);
        }
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn companion_paths() {
        let db = Path::new("/data/store.db");
        assert_eq!(journal_path(db), Path::new("/data/store.db-journal"));
        assert_eq!(lock_path(db), Path::new("/data/store.db-lock"));
    }

    #[test]
    fn exclusive_lock_blocks_second_handle() {
        let temp = tempdir().unwrap();
        let db = temp.path().join("locked.db");

        let _first = FileLock::acquire(&db, false).unwrap();
        assert!(lock_path(&db).exists());
        assert!(matches!(
            FileLock::acquire(&db, false),
            Err(CoreError::DatabaseLocked)
        ));
        assert!(matches!(
            FileLock::acquire(&db, true),
            Err(CoreError::DatabaseLocked)
        ));
    }

    #[test]
    fn shared_locks_coexist() {
        let temp = tempdir().unwrap();
        let db = temp.path().join("shared.db");

        let _a = FileLock::acquire(&db, true).unwrap();
        let _b = FileLock::acquire(&db, true).unwrap();
        assert!(FileLock::acquire(&db, false).is_err());
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let db = temp.path().join("reopen.db");

        drop(FileLock::acquire(&db, false).unwrap());
        let _again = FileLock::acquire(&db, false).unwrap();
    }
}
