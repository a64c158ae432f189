//! Crate-level error type

use thiserror::Error;

pub use crate::alloc::AllocError;

/// Error type for erased-containers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    /// Memory allocation failed
    #[error("memory allocation failed")]
    Alloc(#[from] AllocError),
    /// An arena configuration was rejected by
    /// [`ArenaConfig::validate`](crate::ArenaConfig::validate)
    #[error("invalid arena configuration: {reason}")]
    InvalidConfig {
        /// Which constraint was violated
        reason: &'static str,
    },
}
