//! Interpreter limits.

/// Default bound on nested script function calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// Configuration for a [`crate::Vm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Maximum number of active script call frames, the top-level frame
    /// included. Exceeding it is a runtime error.
    pub max_call_depth: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl VmConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the call depth bound. Zero is treated as one.
    #[must_use]
    pub const fn max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = if depth == 0 { 1 } else { depth };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder() {
        assert_eq!(VmConfig::new().max_call_depth, 256);
        assert_eq!(VmConfig::new().max_call_depth(8).max_call_depth, 8);
        assert_eq!(VmConfig::new().max_call_depth(0).max_call_depth, 1);
    }
}
