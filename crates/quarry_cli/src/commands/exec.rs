//! Exec command implementation.

use crate::error::CliResult;
use quarry_core::Database;
use quarry_vm::{Vm, VmError};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Runs the script in `file` against `db` and prints its output.
///
/// A script that fails at runtime still has its partial output printed
/// before the error is returned.
pub fn run(db: &Database, file: &Path, out: &mut dyn Write) -> CliResult<()> {
    let source = fs::read_to_string(file)?;
    let mut vm = Vm::with_database(db);
    match vm.run(&source) {
        Ok(result) => {
            out.write_all(&result.output)?;
            info!(file = %file.display(), "script finished");
            Ok(())
        }
        Err(err) => {
            if let VmError::Runtime { output, .. } = &err {
                out.write_all(output)?;
            }
            Err(err.into())
        }
    }
}
