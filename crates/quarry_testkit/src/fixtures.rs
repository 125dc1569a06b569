//! Test fixtures and database helpers.
//!
//! Provides convenience functions for setting up test databases
//! and common test scenarios.

use quarry_core::{Config, Database, OpenFlags};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// File name used for file-backed test databases.
pub const TEST_DB_NAME: &str = "test.quarry";

/// A test database with automatic cleanup.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
    config: Config,
}

impl TestDatabase {
    /// Creates a new in-memory test database.
    pub fn memory() -> Self {
        Self::memory_with_config(Config::default())
    }

    /// Creates an in-memory test database with custom configuration.
    pub fn memory_with_config(config: Config) -> Self {
        let db = Database::open_with_config(
            quarry_core::MEMORY_PATH,
            OpenFlags::default(),
            config.clone(),
        )
        .expect("Failed to open in-memory database");
        Self {
            db,
            temp_dir: None,
            config,
        }
    }

    /// Creates a new file-based test database in a fresh temporary
    /// directory.
    pub fn file() -> Self {
        Self::file_with_config(Config::default())
    }

    /// Creates a file-based test database with custom configuration.
    pub fn file_with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open_with_config(
            temp_dir.path().join(TEST_DB_NAME),
            OpenFlags::default(),
            config.clone(),
        )
        .expect("Failed to open file database");
        Self {
            db,
            temp_dir: Some(temp_dir),
            config,
        }
    }

    /// Returns the database path if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|d| d.path().join(TEST_DB_NAME))
    }

    /// Closes the database and opens the same file again.
    ///
    /// # Panics
    ///
    /// For in-memory databases, which do not survive a close.
    pub fn reopen(self) -> Self {
        let path = self.path().expect("only file databases can be reopened");
        let Self {
            db,
            temp_dir,
            config,
        } = self;
        db.close().expect("Failed to close database");
        drop(db);
        let db = Database::open_with_config(&path, OpenFlags::default(), config.clone())
            .expect("Failed to reopen database");
        Self {
            db,
            temp_dir,
            config,
        }
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs a test with a temporary in-memory database.
///
/// # Example
///
/// ```rust
/// use quarry_testkit::with_temp_db;
///
/// with_temp_db(|db| {
///     db.store(b"nombre", b"Juan").unwrap();
///     assert_eq!(db.record_count().unwrap(), 1);
/// });
/// ```
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    let test_db = TestDatabase::memory();
    f(&test_db.db)
}

/// Runs a test with a temporary file-based database.
pub fn with_file_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database, &Path) -> R,
{
    let test_db = TestDatabase::file();
    let path = test_db.path().expect("File database should have a path");
    f(&test_db.db, &path)
}

/// Zero-padded key for record `i`; keys sort in numeric order.
pub fn numbered_key(i: usize) -> Vec<u8> {
    format!("key-{i:06}").into_bytes()
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use quarry_codec::{ArrayMap, Value};

    /// Creates a database holding `record_count` records under
    /// [`numbered_key`], all written in one transaction.
    pub fn populated_database(record_count: usize) -> TestDatabase {
        let test_db = TestDatabase::memory();
        test_db
            .db
            .with_transaction(|db| {
                for i in 0..record_count {
                    db.store(&numbered_key(i), format!("value-{i}").as_bytes())?;
                }
                Ok(())
            })
            .expect("Failed to populate database");
        test_db
    }

    /// Creates a database with a `people` collection of `count` documents
    /// shaped `{name, age}`.
    pub fn people_collection(count: usize) -> TestDatabase {
        let test_db = TestDatabase::memory();
        let people = test_db.db.collection("people").expect("collection handle");
        people.create().expect("Failed to create collection");
        for i in 0..count {
            let mut doc = ArrayMap::new();
            doc.insert("name".into(), Value::from(format!("person-{i}")));
            doc.insert("age".into(), Value::Int(20 + (i % 50) as i64));
            people.store(&Value::array(doc)).expect("Failed to store document");
        }
        test_db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_database_has_no_path() {
        let test_db = TestDatabase::memory();
        assert!(test_db.path().is_none());
        assert_eq!(test_db.record_count().unwrap(), 0);
    }

    #[test]
    fn file_database_survives_reopen() {
        let test_db = TestDatabase::file();
        test_db.store(b"pais", b"Spain").unwrap();
        assert!(test_db.path().unwrap().exists());

        let test_db = test_db.reopen();
        assert_eq!(test_db.fetch(b"pais").unwrap(), Some(b"Spain".to_vec()));
    }

    #[test]
    fn with_file_db_passes_the_path() {
        with_file_db(|db, path| {
            db.store(b"k", b"v").unwrap();
            assert!(path.ends_with(TEST_DB_NAME));
        });
    }

    #[test]
    fn populated_scenarios() {
        let test_db = scenarios::populated_database(25);
        assert_eq!(test_db.record_count().unwrap(), 25);
        assert_eq!(
            test_db.fetch(&numbered_key(7)).unwrap(),
            Some(b"value-7".to_vec())
        );

        let test_db = scenarios::people_collection(5);
        let people = test_db.collection("people").unwrap();
        assert_eq!(people.total_records().unwrap(), 5);
    }
}
