//! Type-erased repeated and map field containers for reflective message
//! runtimes.
//!
//! A reflection layer knows the kind of each field only at runtime, so the
//! containers here are not generic over their element type. Instead each
//! container is created for a [`ValueKind`], stores raw bytes of the width
//! that kind requires (see [`width_for`]), and converts to and from [`Value`]
//! at its boundary.
//!
//! All memory comes from an [`Arena`] which outlives every container built on
//! it. Containers have no destructors, and any operation that needs memory
//! reports exhaustion with [`AllocError`] while leaving the container as it
//! was.
//!
//! ```
//! use erased_containers::{Arena, Array, Map, Value, ValueKind};
//!
//! let arena = Arena::new();
//!
//! let mut arr = Array::new(&arena, ValueKind::Int32)?;
//! arr.append(Value::Int32(10), &arena)?;
//! arr.append(Value::Int32(30), &arena)?;
//! arr.insert(1, 1, &arena)?;
//! arr.set(1, Value::Int32(20));
//! assert_eq!(arr.get(1), Value::Int32(20));
//!
//! let mut map = Map::new(&arena, ValueKind::String, ValueKind::Int32);
//! map.set(Value::String("answer"), Value::Int32(42), &arena)?;
//! assert_eq!(map.get(Value::String("answer")), Some(Value::Int32(42)));
//! # Ok::<(), erased_containers::AllocError>(())
//! ```
#![deny(missing_docs)]

mod alloc;
mod arena;
pub mod array;
mod config;
mod error;
mod kind;
pub mod map;
pub mod map_iter;
mod value;

pub use crate::alloc::AllocError;
pub use arena::{Arena, ArenaAlloc};
pub use array::Array;
pub use config::ArenaConfig;
pub use error::ContainerError;
pub use kind::{width_for, SizeClass, ValueKind};
pub use map::Map;
pub use map_iter::MapIter;
pub use value::{MessageRef, Value};

#[cfg(test)]
#[global_allocator]
static ALLOCATOR: mockalloc::Mockalloc<std::alloc::System> =
    mockalloc::Mockalloc(std::alloc::System);
