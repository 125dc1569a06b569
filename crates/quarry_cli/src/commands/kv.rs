//! Single-record commands.

use crate::error::{CliError, CliResult};
use quarry_core::Database;
use std::io::Write;

/// Writes the value under `key` followed by a newline.
pub fn get(db: &Database, key: &str, out: &mut dyn Write) -> CliResult<()> {
    let value = db
        .fetch(key.as_bytes())?
        .ok_or_else(|| CliError::KeyNotFound(key.to_string()))?;
    out.write_all(&value)?;
    writeln!(out)?;
    Ok(())
}

/// Stores `value` under `key`.
pub fn put(db: &Database, key: &str, value: &str) -> CliResult<()> {
    db.store(key.as_bytes(), value.as_bytes())?;
    Ok(())
}

/// Appends `value` to the record under `key`.
pub fn append(db: &Database, key: &str, value: &str) -> CliResult<()> {
    db.append(key.as_bytes(), value.as_bytes())?;
    Ok(())
}

/// Deletes `key`; reports whether anything was removed.
pub fn delete(db: &Database, key: &str, out: &mut dyn Write) -> CliResult<()> {
    let removed = db.delete(key.as_bytes())?;
    writeln!(out, "{}", if removed { "deleted" } else { "not found" })?;
    Ok(())
}
