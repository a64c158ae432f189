//! The size-class table shared by arrays, maps and the codec layer

use std::mem::size_of;

use serde::{Deserialize, Serialize};

/// Tag identifying the kind of value stored in a container.
///
/// The discriminants match the field type numbering used by the reflection
/// layer, so a `ValueKind` can be round-tripped through a `u8`.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// `bool`, stored as one byte
    Bool = 1,
    /// `f32`
    Float = 2,
    /// `i32`
    Int32 = 3,
    /// `u32`
    UInt32 = 4,
    /// Enum number, stored as `i32`
    Enum = 5,
    /// Reference to a sub-message
    Message = 6,
    /// `f64`
    Double = 7,
    /// `i64`
    Int64 = 8,
    /// `u64`
    UInt64 = 9,
    /// UTF-8 string
    String = 10,
    /// Arbitrary bytes
    Bytes = 11,
}

/// Width of a pointer, as a power of two.
const PTR_LG2: u8 = if size_of::<usize>() == 4 { 2 } else { 3 };

/// Width of a string/bytes handle (pointer + length), as a power of two.
const HANDLE_LG2: u8 = PTR_LG2 + 1;

/// The widths a container needs to know about a [`ValueKind`].
///
/// `byte_width` sizes map keys and values and is zero for strings and bytes,
/// which maps store through their variable-length path. `log2_width` sizes
/// array elements, where strings and bytes occupy a pointer + length handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SizeClass {
    /// Fixed blob width in bytes for map keys/values
    pub byte_width: usize,
    /// Array element width as a power of two
    pub log2_width: u8,
}

/// Resolve the size class for a value kind.
pub const fn width_for(kind: ValueKind) -> SizeClass {
    SizeClass {
        byte_width: kind.map_size(),
        log2_width: kind.size_lg2(),
    }
}

impl ValueKind {
    /// All kinds, in discriminant order.
    pub const ALL: [ValueKind; 11] = [
        ValueKind::Bool,
        ValueKind::Float,
        ValueKind::Int32,
        ValueKind::UInt32,
        ValueKind::Enum,
        ValueKind::Message,
        ValueKind::Double,
        ValueKind::Int64,
        ValueKind::UInt64,
        ValueKind::String,
        ValueKind::Bytes,
    ];

    /// Log2 of the array element width.
    pub const fn size_lg2(self) -> u8 {
        use ValueKind::*;
        match self {
            Bool => 0,
            Float | Int32 | UInt32 | Enum => 2,
            Message => PTR_LG2,
            Double | Int64 | UInt64 => 3,
            String | Bytes => HANDLE_LG2,
        }
    }

    /// Array element width in bytes.
    pub const fn element_size(self) -> usize {
        1 << self.size_lg2()
    }

    /// Fixed map blob width in bytes; zero for strings and bytes.
    pub const fn map_size(self) -> usize {
        use ValueKind::*;
        match self {
            Bool => 1,
            Float | Int32 | UInt32 | Enum => 4,
            Message => size_of::<usize>(),
            Double | Int64 | UInt64 => 8,
            String | Bytes => 0,
        }
    }

    /// Returns `true` for the variable-length kinds.
    pub const fn is_string(self) -> bool {
        matches!(self, ValueKind::String | ValueKind::Bytes)
    }
}

impl TryFrom<u8> for ValueKind {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        ValueKind::ALL
            .iter()
            .copied()
            .find(|kind| *kind as u8 == tag)
            .ok_or(tag)
    }
}
