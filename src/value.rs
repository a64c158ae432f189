//! Functionality relating to the values stored in containers

use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;
use std::mem::size_of;

use crate::kind::ValueKind;

const WORD: usize = size_of::<usize>();

/// Largest number of bytes any value occupies in its raw form: the pointer +
/// length handle used for strings and bytes.
pub(crate) const MAX_VALUE_SIZE: usize = 2 * WORD;

/// Opaque reference to a message owned by the reflection layer.
///
/// Containers copy the pointer around but never dereference it. The lifetime
/// ties the reference to the arena (or other owner) the message lives in.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct MessageRef<'a> {
    ptr: *const (),
    _marker: PhantomData<&'a ()>,
}

impl<'a> MessageRef<'a> {
    /// Refer to a message.
    pub fn new<T>(msg: &'a T) -> Self {
        MessageRef {
            ptr: (msg as *const T).cast(),
            _marker: PhantomData,
        }
    }

    /// The null reference. Freshly grown slots of a message array read as this.
    pub const fn null() -> Self {
        MessageRef {
            ptr: std::ptr::null(),
            _marker: PhantomData,
        }
    }

    /// Wraps a raw pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or remain valid for `'a`.
    pub unsafe fn from_ptr(ptr: *const ()) -> Self {
        MessageRef {
            ptr,
            _marker: PhantomData,
        }
    }

    /// The raw pointer this reference was built from.
    pub fn as_ptr(self) -> *const () {
        self.ptr
    }

    /// Returns `true` for [`MessageRef::null`].
    pub fn is_null(self) -> bool {
        self.ptr.is_null()
    }
}

impl Debug for MessageRef<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "MessageRef({:p})", self.ptr)
    }
}

/// A single element of an array, or a key or value of a map.
///
/// `Value` is what crosses the container boundary: the containers store raw
/// bytes and only consult the variant to encode or decode them.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Value<'a> {
    /// A `bool`
    Bool(bool),
    /// An `f32`
    Float(f32),
    /// An `i32`
    Int32(i32),
    /// A `u32`
    UInt32(u32),
    /// An enum number
    Enum(i32),
    /// A message reference
    Message(MessageRef<'a>),
    /// An `f64`
    Double(f64),
    /// An `i64`
    Int64(i64),
    /// A `u64`
    UInt64(u64),
    /// A UTF-8 string
    String(&'a str),
    /// Arbitrary bytes
    Bytes(&'a [u8]),
}

macro_rules! from_impl {
    ($(($ty:ty, $variant:ident)),*) => {
        $(impl From<$ty> for Value<'_> {
            fn from(other: $ty) -> Self {
                Value::$variant(other)
            }
        })*
    };
}

from_impl!(
    (bool, Bool),
    (f32, Float),
    (i32, Int32),
    (u32, UInt32),
    (f64, Double),
    (i64, Int64),
    (u64, UInt64)
);

impl<'a> From<MessageRef<'a>> for Value<'a> {
    fn from(other: MessageRef<'a>) -> Self {
        Value::Message(other)
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(other: &'a str) -> Self {
        Value::String(other)
    }
}

impl<'a> From<&'a [u8]> for Value<'a> {
    fn from(other: &'a [u8]) -> Self {
        Value::Bytes(other)
    }
}

macro_rules! accessor_impl {
    ($(($name:ident, $ty:ty, $variant:ident)),*) => {
        $(
            #[doc = concat!("Returns the payload if this is a `", stringify!($variant), "`.")]
            pub fn $name(&self) -> Option<$ty> {
                match *self {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }
        )*
    };
}

impl<'a> Value<'a> {
    /// The kind tag of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Float(_) => ValueKind::Float,
            Value::Int32(_) => ValueKind::Int32,
            Value::UInt32(_) => ValueKind::UInt32,
            Value::Enum(_) => ValueKind::Enum,
            Value::Message(_) => ValueKind::Message,
            Value::Double(_) => ValueKind::Double,
            Value::Int64(_) => ValueKind::Int64,
            Value::UInt64(_) => ValueKind::UInt64,
            Value::String(_) => ValueKind::String,
            Value::Bytes(_) => ValueKind::Bytes,
        }
    }

    accessor_impl!(
        (as_bool, bool, Bool),
        (as_f32, f32, Float),
        (as_i32, i32, Int32),
        (as_u32, u32, UInt32),
        (as_enum, i32, Enum),
        (as_message, MessageRef<'a>, Message),
        (as_f64, f64, Double),
        (as_i64, i64, Int64),
        (as_u64, u64, UInt64),
        (as_str, &'a str, String),
        (as_bytes, &'a [u8], Bytes)
    );

    /// Encodes the value into its raw form: native-endian scalar bytes, the
    /// pointer address for messages, or a pointer + length handle for
    /// strings and bytes. Bytes past the kind's width are zero.
    pub(crate) fn to_raw(self) -> RawValue {
        let mut raw = RawValue::ZERO;
        match self {
            Value::Bool(v) => raw.put(0, &[v as u8]),
            Value::Float(v) => raw.put(0, &v.to_ne_bytes()),
            Value::Int32(v) | Value::Enum(v) => raw.put(0, &v.to_ne_bytes()),
            Value::UInt32(v) => raw.put(0, &v.to_ne_bytes()),
            Value::Message(m) => raw.put(0, &(m.ptr as usize).to_ne_bytes()),
            Value::Double(v) => raw.put(0, &v.to_ne_bytes()),
            Value::Int64(v) => raw.put(0, &v.to_ne_bytes()),
            Value::UInt64(v) => raw.put(0, &v.to_ne_bytes()),
            Value::String(s) => raw.put_handle(s.as_bytes()),
            Value::Bytes(b) => raw.put_handle(b),
        }
        raw
    }

    /// Decodes a value of `kind` from the front of `src`.
    ///
    /// # Safety
    ///
    /// `src` must hold at least `kind.element_size()` bytes which are either
    /// all zero or were produced by [`Value::to_raw`] from a `Value` of the
    /// same kind whose borrows live for `'a`.
    pub(crate) unsafe fn from_raw(kind: ValueKind, src: &[u8]) -> Value<'a> {
        match kind {
            ValueKind::Bool => Value::Bool(src[0] != 0),
            ValueKind::Float => Value::Float(f32::from_ne_bytes(read(src))),
            ValueKind::Int32 => Value::Int32(i32::from_ne_bytes(read(src))),
            ValueKind::UInt32 => Value::UInt32(u32::from_ne_bytes(read(src))),
            ValueKind::Enum => Value::Enum(i32::from_ne_bytes(read(src))),
            ValueKind::Message => {
                let addr = usize::from_ne_bytes(read(src));
                Value::Message(MessageRef::from_ptr(addr as *const ()))
            }
            ValueKind::Double => Value::Double(f64::from_ne_bytes(read(src))),
            ValueKind::Int64 => Value::Int64(i64::from_ne_bytes(read(src))),
            ValueKind::UInt64 => Value::UInt64(u64::from_ne_bytes(read(src))),
            // Safety: string handles are only ever encoded from `&str`
            ValueKind::String => {
                Value::String(std::str::from_utf8_unchecked(read_handle(src)))
            }
            ValueKind::Bytes => Value::Bytes(read_handle(src)),
        }
    }
}

fn read<const N: usize>(src: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&src[..N]);
    out
}

// Safety: see `Value::from_raw`
unsafe fn read_handle<'a>(src: &[u8]) -> &'a [u8] {
    let addr = usize::from_ne_bytes(read(src));
    let len = usize::from_ne_bytes(read(&src[WORD..]));
    if len == 0 {
        // Zero-filled slots have a null address
        &[]
    } else {
        std::slice::from_raw_parts(addr as *const u8, len)
    }
}

/// The raw form of a [`Value`]: the bytes a container actually stores.
#[derive(Copy, Clone, PartialEq, Eq)]
pub(crate) struct RawValue([u8; MAX_VALUE_SIZE]);

impl RawValue {
    pub(crate) const ZERO: RawValue = RawValue([0; MAX_VALUE_SIZE]);

    fn put(&mut self, offset: usize, bytes: &[u8]) {
        self.0[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn put_handle(&mut self, data: &[u8]) {
        self.put(0, &(data.as_ptr() as usize).to_ne_bytes());
        self.put(WORD, &data.len().to_ne_bytes());
    }

    pub(crate) fn as_bytes(&self) -> &[u8; MAX_VALUE_SIZE] {
        &self.0
    }
}

impl Debug for RawValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}
