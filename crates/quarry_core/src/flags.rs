//! Open mode flags.

use crate::error::{CoreError, CoreResult};

/// Path marker that selects an in-memory database.
pub const MEMORY_PATH: &str = ":mem:";

bitflags::bitflags! {
    /// Mode flags accepted by [`crate::Database::open`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u32 {
        /// Open an existing file for reading only.
        const READ_ONLY = 0x0001;
        /// Open for reading and writing.
        const READ_WRITE = 0x0002;
        /// Create the file if it does not exist.
        const CREATE = 0x0004;
        /// Fail if the file already exists.
        const EXCLUSIVE = 0x0008;
        /// Delete the file and its journal when the handle closes.
        const TEMPORARY = 0x0010;
        /// Keep everything in memory; nothing survives the handle.
        const IN_MEMORY = 0x0020;
        /// Run without a rollback journal.
        const OMIT_JOURNAL = 0x0040;
        /// Request memory-mapped reads. Accepted as a hint.
        const MEMORY_MAPPED = 0x0080;
    }
}

impl Default for OpenFlags {
    fn default() -> Self {
        OpenFlags::READ_WRITE | OpenFlags::CREATE
    }
}

impl OpenFlags {
    /// Returns `true` if writes are allowed.
    #[must_use]
    pub fn is_writable(self) -> bool {
        !self.contains(OpenFlags::READ_ONLY)
    }

    /// Rejects contradictory combinations.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `READ_ONLY` is combined with `READ_WRITE`,
    /// `EXCLUSIVE`, `TEMPORARY` or `IN_MEMORY`.
    pub fn validate(self) -> CoreResult<()> {
        let writers = OpenFlags::READ_WRITE
            | OpenFlags::EXCLUSIVE
            | OpenFlags::TEMPORARY
            | OpenFlags::IN_MEMORY;
        if self.contains(OpenFlags::READ_ONLY) && self.intersects(writers) {
            return Err(CoreError::invalid_argument(format!(
                "read-only cannot be combined with {:?}",
                self & writers
            )));
        }
        Ok(())
    }
}
