//! CLI command implementations.

pub mod exec;
pub mod inspect;
pub mod kv;
pub mod scan;
pub mod verify;

use crate::error::CliResult;
use std::io::Write;

/// Prints the tool and library versions.
pub fn version(out: &mut dyn Write) -> CliResult<()> {
    writeln!(out, "quarry {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(out, "quarry_core {}", quarry_core::version())?;
    writeln!(out, "thread-safe: {}", quarry_core::is_threadsafe())?;
    Ok(())
}
