//! Functionality relating to the map field container

use std::fmt::{self, Debug, Formatter};

use hashbrown::hash_map::DefaultHashBuilder;
use hashbrown::HashMap;

use crate::alloc::AllocError;
use crate::arena::{Arena, ArenaAlloc};
use crate::kind::{width_for, ValueKind};
use crate::map_iter::{Entries, MapIter};
use crate::value::{Value, MAX_VALUE_SIZE};

/// Widest fixed-size key or value: a 64-bit scalar or a pointer.
const FIXED_MAX: usize = 8;

/// A key or value in packed form.
///
/// Fixed-width kinds keep exactly `size` native-endian bytes inline. Strings
/// and bytes are carried as their content, without a fixed width.
#[derive(Copy, Clone)]
pub(crate) enum Blob<'a> {
    Fixed { buf: [u8; FIXED_MAX], size: usize },
    Var(&'a [u8]),
}

impl<'a> Blob<'a> {
    pub(crate) fn pack(value: Value<'a>, size: usize) -> Self {
        match value {
            Value::String(s) => Blob::Var(s.as_bytes()),
            Value::Bytes(b) => Blob::Var(b),
            _ => {
                let raw = value.to_raw();
                let mut buf = [0u8; FIXED_MAX];
                buf[..size].copy_from_slice(&raw.as_bytes()[..size]);
                Blob::Fixed { buf, size }
            }
        }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        match self {
            Blob::Fixed { buf, size } => &buf[..*size],
            Blob::Var(bytes) => bytes,
        }
    }

    /// Unpacks a value of `kind`.
    ///
    /// # Safety
    ///
    /// The blob must have been packed from a value of `kind`.
    pub(crate) unsafe fn unpack(&self, kind: ValueKind) -> Value<'a> {
        match *self {
            Blob::Fixed { buf, size } => unpack_fixed(kind, &buf[..size]),
            Blob::Var(bytes) => unpack_var(kind, bytes),
        }
    }
}

// Safety: `bytes` must be the packed form of a fixed-width value of `kind`
unsafe fn unpack_fixed<'a>(kind: ValueKind, bytes: &[u8]) -> Value<'a> {
    let mut raw = [0u8; MAX_VALUE_SIZE];
    raw[..bytes.len()].copy_from_slice(bytes);
    Value::from_raw(kind, &raw)
}

// Safety: `bytes` must be the content of a string (valid UTF-8) or bytes value
unsafe fn unpack_var(kind: ValueKind, bytes: &[u8]) -> Value<'_> {
    match kind {
        ValueKind::String => Value::String(std::str::from_utf8_unchecked(bytes)),
        _ => Value::Bytes(bytes),
    }
}

/// Unpacks a key stored in the table.
///
/// # Safety
///
/// `bytes` must have been packed from a key of `kind`.
pub(crate) unsafe fn unpack_key(kind: ValueKind, bytes: &[u8]) -> Value<'_> {
    if kind.is_string() {
        unpack_var(kind, bytes)
    } else {
        unpack_fixed(kind, bytes)
    }
}

pub(crate) type Table<'a> =
    HashMap<&'a [u8], Blob<'a>, DefaultHashBuilder, ArenaAlloc<'a>>;

/// The `Map` type is an associative container from keys of one [`ValueKind`]
/// to values of another.
///
/// Keys and values are packed into byte blobs whose widths are fixed when the
/// map is created; the backing table only ever sees bytes. Key bytes are
/// copied into the arena on first insertion. String and bytes values are
/// stored by reference, so they must outlive the map like any other `'a`
/// borrow.
pub struct Map<'a> {
    pub(crate) table: Table<'a>,
    key_kind: ValueKind,
    val_kind: ValueKind,
    key_size: usize,
    val_size: usize,
}

impl<'a> Map<'a> {
    /// Constructs a new empty map. Does not allocate.
    #[must_use]
    pub fn new(arena: &'a Arena, key_kind: ValueKind, val_kind: ValueKind) -> Self {
        Map {
            table: HashMap::with_hasher_in(
                DefaultHashBuilder::default(),
                ArenaAlloc(arena),
            ),
            key_kind,
            val_kind,
            key_size: width_for(key_kind).byte_width,
            val_size: width_for(val_kind).byte_width,
        }
    }

    /// Returns the number of entries in the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// The kind of the keys.
    #[must_use]
    pub fn key_kind(&self) -> ValueKind {
        self.key_kind
    }

    /// The kind of the values.
    #[must_use]
    pub fn value_kind(&self) -> ValueKind {
        self.val_kind
    }

    /// Fixed width of packed keys in bytes; zero for string and bytes keys.
    #[must_use]
    pub fn key_size(&self) -> usize {
        self.key_size
    }

    /// Fixed width of packed values in bytes; zero for string and bytes values.
    #[must_use]
    pub fn value_size(&self) -> usize {
        self.val_size
    }

    fn check_key(&self, key: &Value<'_>) {
        assert_eq!(
            key.kind(),
            self.key_kind,
            "key kind does not match map key kind"
        );
    }

    fn check_value(&self, value: &Value<'a>) {
        assert_eq!(
            value.kind(),
            self.val_kind,
            "value kind does not match map value kind"
        );
    }

    /// Looks up `key`.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not of the map's key kind.
    #[must_use]
    pub fn get(&self, key: Value<'_>) -> Option<Value<'a>> {
        self.check_key(&key);
        let key = Blob::pack(key, self.key_size);
        let blob = self.table.get(key.as_bytes())?;
        // Safety: stored values are packed from `val_kind` values
        Some(unsafe { blob.unpack(self.val_kind) })
    }

    /// Returns `true` if the map holds `key`.
    #[must_use]
    pub fn contains_key(&self, key: Value<'_>) -> bool {
        self.check_key(&key);
        let key = Blob::pack(key, self.key_size);
        self.table.contains_key(key.as_bytes())
    }

    /// Inserts `value` under `key`, replacing any previous value.
    ///
    /// Allocates from `arena` (which must be the arena the map was created
    /// with) to copy a new key or to grow the table. On failure the map is
    /// unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `key` or `value` is not of the map's kinds. Debug builds
    /// also panic if `arena` is not the map's arena.
    pub fn set(
        &mut self,
        key: Value<'_>,
        value: Value<'a>,
        arena: &'a Arena,
    ) -> Result<(), AllocError> {
        debug_assert!(
            std::ptr::eq(arena, self.table.allocator().0),
            "map used with a different arena"
        );
        self.check_key(&key);
        self.check_value(&value);
        let key = Blob::pack(key, self.key_size);
        let value = Blob::pack(value, self.val_size);

        if let Some(slot) = self.table.get_mut(key.as_bytes()) {
            *slot = value;
            return Ok(());
        }
        // A refused reservation must leave the arena untouched
        self.table.try_reserve(1)?;
        let key = arena.copy_bytes(key.as_bytes())?;
        self.table.insert(key, value);
        Ok(())
    }

    /// Removes `key`, returning whether it was present. Never allocates.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not of the map's key kind.
    pub fn delete(&mut self, key: Value<'_>) -> bool {
        self.check_key(&key);
        let key = Blob::pack(key, self.key_size);
        self.table.remove(key.as_bytes()).is_some()
    }

    /// Removes every entry. The table keeps its capacity.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// A cursor positioned before the first entry. See [`MapIter`].
    pub fn begin(&self) -> MapIter<'_, 'a> {
        MapIter::new(self)
    }

    /// Returns an iterator over the `(key, value)` pairs, in table order.
    pub fn iter(&self) -> Entries<'_, 'a> {
        Entries::new(self.begin())
    }
}

impl Debug for Map<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'m, 'a> IntoIterator for &'m Map<'a> {
    type Item = (Value<'a>, Value<'a>);
    type IntoIter = Entries<'m, 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
