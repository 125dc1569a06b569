//! Verify command implementation.

use crate::error::CliResult;
use quarry_core::Database;
use std::io::Write;

/// Walks every page of the store and prints what it found.
///
/// A damaged store is reported as the command's error.
pub fn run(db: &Database, out: &mut dyn Write) -> CliResult<()> {
    let report = match db.verify() {
        Ok(report) => report,
        Err(err) => {
            writeln!(out, "verification failed")?;
            return Err(err.into());
        }
    };
    writeln!(out, "Pages:          {}", report.pages)?;
    writeln!(out, "  leaf:         {}", report.leaf_pages)?;
    writeln!(out, "  internal:     {}", report.internal_pages)?;
    writeln!(out, "  overflow:     {}", report.overflow_pages)?;
    writeln!(out, "  free:         {}", report.free_pages)?;
    writeln!(out, "Tree depth:     {}", report.depth)?;
    writeln!(out, "Records:        {}", report.records)?;
    writeln!(out, "ok")?;
    Ok(())
}
