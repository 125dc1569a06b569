//! CLI error type.

use quarry_core::CoreError;
use quarry_vm::VmError;
use std::io;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Why a command failed.
#[derive(Debug, Error)]
pub enum CliError {
    /// No `--path` was given for a command that needs a store.
    #[error("a database path is required (use --path, or --path :mem:)")]
    MissingPath,

    /// `get` found nothing under the key.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Engine failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Script failure.
    #[error(transparent)]
    Script(#[from] VmError),

    /// Reading a script or writing output failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// JSON rendering failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
