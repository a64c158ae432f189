//! Arena configuration parameters.

use serde::{Deserialize, Serialize};

use crate::error::ContainerError;

/// Configuration for an [`Arena`](crate::Arena).
///
/// Controls block sizing and an optional ceiling on the total number of bytes
/// the arena may request from the global allocator. Validated when the arena
/// is constructed; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Size in bytes of the first block.
    ///
    /// Default: 4096. Must be non-zero and no larger than `max_block_size`.
    pub initial_block_size: usize,

    /// Upper bound for the doubling block size.
    ///
    /// Requests larger than this still succeed; they receive a dedicated
    /// block of exactly the required size.
    pub max_block_size: usize,

    /// Total bytes of blocks the arena may hold. `None` means unbounded.
    ///
    /// Once a new block would push the total past this limit, allocation
    /// fails with [`AllocError`](crate::AllocError).
    pub max_bytes: Option<usize>,
}

impl ArenaConfig {
    /// Default size of the first block.
    pub const DEFAULT_INITIAL_BLOCK_SIZE: usize = 4096;

    /// Default cap on the doubling block size (1MB).
    pub const DEFAULT_MAX_BLOCK_SIZE: usize = 1 << 20;

    /// Create a config with default block sizes and no byte limit.
    pub fn new() -> Self {
        Self {
            initial_block_size: Self::DEFAULT_INITIAL_BLOCK_SIZE,
            max_block_size: Self::DEFAULT_MAX_BLOCK_SIZE,
            max_bytes: None,
        }
    }

    /// Set the size of the first block.
    #[must_use]
    pub fn with_initial_block_size(mut self, size: usize) -> Self {
        self.initial_block_size = size;
        self
    }

    /// Set the cap on the doubling block size.
    #[must_use]
    pub fn with_max_block_size(mut self, size: usize) -> Self {
        self.max_block_size = size;
        self
    }

    /// Limit the total bytes the arena may hold.
    #[must_use]
    pub fn with_max_bytes(mut self, limit: usize) -> Self {
        self.max_bytes = Some(limit);
        self
    }

    /// Check the invariants between the fields.
    pub fn validate(&self) -> Result<(), ContainerError> {
        if self.initial_block_size == 0 {
            return Err(ContainerError::InvalidConfig {
                reason: "initial_block_size must be non-zero",
            });
        }
        if self.initial_block_size > self.max_block_size {
            return Err(ContainerError::InvalidConfig {
                reason: "initial_block_size exceeds max_block_size",
            });
        }
        if self.max_block_size > isize::MAX as usize {
            return Err(ContainerError::InvalidConfig {
                reason: "max_block_size exceeds isize::MAX",
            });
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new()
    }
}
