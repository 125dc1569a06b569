//! Scan command implementation.

use crate::error::CliResult;
use quarry_core::{Database, SeekMode};
use std::io::Write;

/// Prints `key<TAB>value` lines in key order.
///
/// `from` positions the cursor at that key, or at the nearest key in the
/// direction of the scan.
pub fn run(
    db: &Database,
    from: Option<&str>,
    reverse: bool,
    limit: Option<usize>,
    out: &mut dyn Write,
) -> CliResult<()> {
    let mut cursor = db.cursor()?;
    let mut valid = match (from, reverse) {
        (Some(key), false) => cursor.seek(key.as_bytes(), SeekMode::GreaterOrEqual)?,
        (Some(key), true) => cursor.seek(key.as_bytes(), SeekMode::LessOrEqual)?,
        (None, false) => cursor.first()?,
        (None, true) => cursor.last()?,
    };

    let limit = limit.unwrap_or(usize::MAX);
    let mut shown = 0;
    while valid && shown < limit {
        let (key, value) = cursor.record()?;
        out.write_all(&key)?;
        out.write_all(b"\t")?;
        out.write_all(&value)?;
        writeln!(out)?;
        shown += 1;
        valid = if reverse {
            cursor.previous()?
        } else {
            cursor.advance()?
        };
    }
    Ok(())
}
