//! Module for fallible allocation

use std::error::Error;
use std::fmt;

/// Error type for fallible allocation.
///
/// Returned when the arena is exhausted (its configured byte limit would be
/// exceeded) or the global allocator refuses a new block. A container that
/// reports this error is left exactly as it was before the call.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct AllocError;

impl Error for AllocError {}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("arena allocation failed")
    }
}

impl From<allocator_api2::alloc::AllocError> for AllocError {
    fn from(_: allocator_api2::alloc::AllocError) -> Self {
        AllocError
    }
}

impl From<hashbrown::TryReserveError> for AllocError {
    fn from(_: hashbrown::TryReserveError) -> Self {
        AllocError
    }
}
