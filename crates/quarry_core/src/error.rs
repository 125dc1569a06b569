//! Error types for QuarryDB core.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Stable error taxonomy shared by every layer of the engine.
///
/// Each kind carries a fixed numeric code that bindings can expose. The
/// numbering is part of the public contract and never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorKind {
    /// A key, record, collection or file was not found.
    NotFound = 1,
    /// The target already exists.
    AlreadyExists = 2,
    /// A caller-supplied argument is invalid.
    InvalidArgument = 3,
    /// An allocation failed.
    OutOfMemory = 4,
    /// The underlying storage failed.
    IoError = 5,
    /// A structural invariant of the store was violated.
    CorruptStore = 6,
    /// A contended resource; the caller may retry.
    Busy = 7,
    /// The operation is not allowed in the current state.
    InvalidState = 8,
    /// A script failed to compile.
    CompileError = 9,
    /// A script failed while running.
    RuntimeError = 10,
    /// The file is not a QuarryDB store this version can read.
    UnsupportedFormat = 11,
    /// An unknown configuration verb or value.
    UnknownConfig = 12,
    /// A write was attempted on a read-only store.
    ReadOnly = 13,
}

impl ErrorKind {
    /// Returns the stable numeric code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Returns the short name of this kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::AlreadyExists => "AlreadyExists",
            Self::InvalidArgument => "InvalidArgument",
            Self::OutOfMemory => "OutOfMemory",
            Self::IoError => "IoError",
            Self::CorruptStore => "CorruptStore",
            Self::Busy => "Busy",
            Self::InvalidState => "InvalidState",
            Self::CompileError => "CompileError",
            Self::RuntimeError => "RuntimeError",
            Self::UnsupportedFormat => "UnsupportedFormat",
            Self::UnknownConfig => "UnknownConfig",
            Self::ReadOnly => "ReadOnly",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors that can occur in QuarryDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] quarry_storage::StorageError),

    /// Document codec error.
    #[error("codec error: {0}")]
    Codec(#[from] quarry_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Something the caller asked for does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// What was looked up.
        what: String,
    },

    /// Something the caller tried to create already exists.
    #[error("already exists: {what}")]
    AlreadyExists {
        /// What already exists.
        what: String,
    },

    /// Invalid argument.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// Key exceeds the maximum size for the page size in use.
    #[error("key of {len} bytes exceeds the maximum of {max} bytes")]
    KeyTooLarge {
        /// Length of the rejected key.
        len: usize,
        /// Maximum key length.
        max: usize,
    },

    /// The store is structurally damaged.
    #[error("corrupt store: {message}")]
    Corrupt {
        /// Description of the corruption.
        message: String,
    },

    /// Page checksum mismatch detected.
    #[error("checksum mismatch on page {page}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Page number.
        page: u64,
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// Another handle holds the file lock.
    #[error("database locked: another handle has access")]
    DatabaseLocked,

    /// The resource is busy.
    #[error("busy: {message}")]
    Busy {
        /// Description of the contention.
        message: String,
    },

    /// A transaction is already active.
    #[error("a transaction is already active")]
    AlreadyActive,

    /// Operation not permitted in current state.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of why operation is invalid.
        message: String,
    },

    /// Database is closed.
    #[error("database is closed")]
    DatabaseClosed,

    /// Write attempted on a read-only store.
    #[error("database is opened read-only")]
    ReadOnly,

    /// Invalid database format or version.
    #[error("unsupported format: {message}")]
    UnsupportedFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Unknown configuration verb or value.
    #[error("unknown configuration: {name}")]
    UnknownConfig {
        /// The verb or value that was not recognized.
        name: String,
    },

    /// Collection not found.
    #[error("collection not found: {name}")]
    CollectionNotFound {
        /// Name of the collection.
        name: String,
    },
}

impl CoreError {
    /// Maps the error onto the stable taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage(quarry_storage::StorageError::Io(e)) | Self::Io(e) => io_kind(e),
            Self::Storage(quarry_storage::StorageError::ReadPastEnd { .. }) => {
                ErrorKind::CorruptStore
            }
            Self::Codec(_) | Self::Corrupt { .. } | Self::ChecksumMismatch { .. } => {
                ErrorKind::CorruptStore
            }
            Self::NotFound { .. } | Self::CollectionNotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::InvalidArgument { .. } | Self::KeyTooLarge { .. } => ErrorKind::InvalidArgument,
            Self::DatabaseLocked | Self::Busy { .. } => ErrorKind::Busy,
            Self::AlreadyActive | Self::InvalidState { .. } | Self::DatabaseClosed => {
                ErrorKind::InvalidState
            }
            Self::ReadOnly => ErrorKind::ReadOnly,
            Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Self::UnknownConfig { .. } => ErrorKind::UnknownConfig,
        }
    }

    /// Returns `true` if the error means the store is damaged.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        self.kind() == ErrorKind::CorruptStore
    }

    /// Creates a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates an already exists error.
    pub fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists { what: what.into() }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }

    /// Creates a busy error.
    pub fn busy(message: impl Into<String>) -> Self {
        Self::Busy {
            message: message.into(),
        }
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates an unsupported format error.
    pub fn unsupported_format(message: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            message: message.into(),
        }
    }

    /// Creates an unknown configuration error.
    pub fn unknown_config(name: impl Into<String>) -> Self {
        Self::UnknownConfig { name: name.into() }
    }
}

fn io_kind(e: &io::Error) -> ErrorKind {
    match e.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
        io::ErrorKind::OutOfMemory => ErrorKind::OutOfMemory,
        io::ErrorKind::PermissionDenied => ErrorKind::ReadOnly,
        io::ErrorKind::WouldBlock => ErrorKind::Busy,
        _ => ErrorKind::IoError,
    }
}
