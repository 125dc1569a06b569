//! Script errors.

use quarry_core::{CoreError, ErrorKind};
use thiserror::Error;

/// Result type for compiling and running scripts.
pub type VmResult<T> = Result<T, VmError>;

/// A script failed to compile or to run.
#[derive(Debug, Error)]
pub enum VmError {
    /// The source is not a valid script.
    #[error("compile error at line {line}: {message}")]
    Compile {
        /// 1-based source line.
        line: u32,
        /// What went wrong.
        message: String,
    },

    /// Execution was aborted.
    ///
    /// `output` holds everything the script printed before the failure.
    #[error("runtime error at line {line}: {message}")]
    Runtime {
        /// What went wrong.
        message: String,
        /// Line of the failing instruction, 0 when unknown.
        line: u32,
        /// Output produced before the failure.
        output: Vec<u8>,
    },
}

impl VmError {
    /// Creates a compile error.
    pub fn compile(line: u32, message: impl Into<String>) -> Self {
        Self::Compile {
            line,
            message: message.into(),
        }
    }

    /// Creates a runtime error without location or output.
    ///
    /// Foreign functions return this; the interpreter fills in the line.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
            line: 0,
            output: Vec::new(),
        }
    }

    /// Maps the error onto the engine-wide taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Compile { .. } => ErrorKind::CompileError,
            Self::Runtime { .. } => ErrorKind::RuntimeError,
        }
    }

    /// Returns the message without location.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Compile { message, .. } | Self::Runtime { message, .. } => message,
        }
    }

    /// Output produced before a runtime failure.
    #[must_use]
    pub fn output(&self) -> &[u8] {
        match self {
            Self::Compile { .. } => &[],
            Self::Runtime { output, .. } => output,
        }
    }

    pub(crate) fn at_line(self, at: u32) -> Self {
        match self {
            Self::Runtime {
                message,
                line: 0,
                output,
            } => Self::Runtime {
                message,
                line: at,
                output,
            },
            other => other,
        }
    }

    pub(crate) fn with_output(self, produced: Vec<u8>) -> Self {
        match self {
            Self::Runtime { message, line, .. } => Self::Runtime {
                message,
                line,
                output: produced,
            },
            other => other,
        }
    }
}

impl From<CoreError> for VmError {
    fn from(err: CoreError) -> Self {
        Self::runtime(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_messages() {
        let err = VmError::compile(3, "unexpected ')'");
        assert_eq!(err.kind(), ErrorKind::CompileError);
        assert_eq!(err.to_string(), "compile error at line 3: unexpected ')'");

        let err = VmError::runtime("division by zero")
            .at_line(7)
            .with_output(b"partial".to_vec());
        assert_eq!(err.kind(), ErrorKind::RuntimeError);
        assert_eq!(err.message(), "division by zero");
        assert_eq!(err.output(), b"partial");
        assert_eq!(err.to_string(), "runtime error at line 7: division by zero");
    }

    #[test]
    fn line_is_set_once() {
        let err = VmError::runtime("x").at_line(2).at_line(9);
        assert!(matches!(err, VmError::Runtime { line: 2, .. }));
    }

    #[test]
    fn core_errors_become_runtime_errors() {
        let err: VmError = CoreError::DatabaseClosed.into();
        assert_eq!(err.kind(), ErrorKind::RuntimeError);
    }
}
