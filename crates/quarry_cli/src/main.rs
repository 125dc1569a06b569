//! QuarryDB CLI
//!
//! Command-line access to a QuarryDB store.
//!
//! # Commands
//!
//! - `get`, `put`, `append`, `delete` - single-record key/value access
//! - `scan` - walk records in key order
//! - `exec` - run a script against the store
//! - `inspect` - header facts and runtime counters
//! - `verify` - check page checksums, tree ordering and the free list
//! - `version` - library version

mod commands;
mod error;

use clap::{Parser, Subcommand};
use commands::inspect::Format;
use error::{CliError, CliResult};
use quarry_core::{Database, OpenFlags, MEMORY_PATH};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// QuarryDB command-line tools.
#[derive(Parser)]
#[command(name = "quarry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database file (`:mem:` for a throwaway in-memory store)
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the value stored under a key
    Get {
        /// Key to read
        key: String,
    },

    /// Store a value, replacing any previous one
    Put {
        /// Key to write
        key: String,
        /// Value to store
        value: String,
    },

    /// Append to the value stored under a key
    Append {
        /// Key to write
        key: String,
        /// Bytes to append
        value: String,
    },

    /// Delete a key
    Delete {
        /// Key to remove
        key: String,
    },

    /// List records in key order
    Scan {
        /// Start at this key (or the nearest one in scan direction)
        #[arg(short, long)]
        from: Option<String>,

        /// Walk from the largest key down
        #[arg(short, long)]
        reverse: bool,

        /// Stop after this many records
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Run a script file against the database and print its output
    Exec {
        /// Script to run
        file: PathBuf,
    },

    /// Display database header facts and statistics
    Inspect {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Verify database integrity
    Verify,

    /// Show version information
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match run(cli, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = out.flush();
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, out: &mut dyn Write) -> CliResult<()> {
    if let Commands::Version = cli.command {
        return commands::version(out);
    }
    let path = cli.path.ok_or(CliError::MissingPath)?;
    let writes = matches!(
        cli.command,
        Commands::Put { .. } | Commands::Append { .. } | Commands::Delete { .. } | Commands::Exec { .. }
    );
    let db = open(&path, writes)?;

    let result = match cli.command {
        Commands::Get { key } => commands::kv::get(&db, &key, out),
        Commands::Put { key, value } => commands::kv::put(&db, &key, &value),
        Commands::Append { key, value } => commands::kv::append(&db, &key, &value),
        Commands::Delete { key } => commands::kv::delete(&db, &key, out),
        Commands::Scan {
            from,
            reverse,
            limit,
        } => commands::scan::run(&db, from.as_deref(), reverse, limit, out),
        Commands::Exec { file } => commands::exec::run(&db, &file, out),
        Commands::Inspect { format } => commands::inspect::run(&db, format, out),
        Commands::Verify => commands::verify::run(&db, out),
        Commands::Version => Ok(()),
    };
    let closed = db.close().map_err(CliError::from);
    result.and(closed)
}

/// Opens the store, read-only unless the command writes.
fn open(path: &Path, writes: bool) -> CliResult<Database> {
    let flags = if writes || path.as_os_str() == MEMORY_PATH {
        OpenFlags::default()
    } else {
        OpenFlags::READ_ONLY
    };
    debug!(path = %path.display(), ?flags, "opening database");
    Ok(Database::open(path, flags)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quarry(args: &[&str]) -> CliResult<String> {
        let cli = Cli::try_parse_from(std::iter::once("quarry").chain(args.iter().copied()))
            .expect("arguments parse");
        let mut out = Vec::new();
        run(cli, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cli.db");
        let p = path.to_str().unwrap();

        quarry(&["--path", p, "put", "b", "2"]).unwrap();
        quarry(&["--path", p, "put", "a", "1"]).unwrap();
        quarry(&["--path", p, "append", "a", "+"]).unwrap();
        assert_eq!(quarry(&["--path", p, "get", "a"]).unwrap(), "1+\n");
        assert_eq!(quarry(&["--path", p, "scan"]).unwrap(), "a\t1+\nb\t2\n");
        assert_eq!(
            quarry(&["--path", p, "scan", "--reverse", "--limit", "1"]).unwrap(),
            "b\t2\n"
        );
        assert_eq!(quarry(&["--path", p, "delete", "b"]).unwrap(), "deleted\n");
        assert!(matches!(
            quarry(&["--path", p, "get", "b"]),
            Err(CliError::KeyNotFound(_))
        ));
        assert!(quarry(&["--path", p, "verify"]).unwrap().contains("ok"));
    }

    #[test]
    fn path_is_required() {
        assert!(matches!(quarry(&["get", "k"]), Err(CliError::MissingPath)));
        assert!(quarry(&["version"]).unwrap().contains(quarry_core::version()));
    }

    #[test]
    fn runs_scripts_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("hello.qs");
        std::fs::write(&script, "kv_store('k', 'v'); print kv_fetch('k'), '!';").unwrap();
        let out = quarry(&["--path", ":mem:", "exec", script.to_str().unwrap()]).unwrap();
        assert_eq!(out, "v!");
    }
}
