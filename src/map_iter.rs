//! Cursor-style traversal of a [`Map`]

use std::iter::FusedIterator;

use hashbrown::hash_map;

use crate::map::{unpack_key, Blob, Map};
use crate::value::Value;

#[derive(Copy, Clone)]
enum Position<'m, 'a> {
    Begin,
    At(&'a [u8], &'m Blob<'a>),
    Done,
}

/// A cursor over the entries of a [`Map`].
///
/// The cursor starts before the first entry. Each call to [`MapIter::next`]
/// advances it, and while it returns `true` the current entry is available
/// through [`MapIter::key`] and [`MapIter::value`]. Entries are visited in
/// table order, which is unspecified. The cursor borrows the map, so the map
/// cannot be modified during a traversal.
///
/// ```
/// # use erased_containers::{Arena, Map, Value, ValueKind};
/// let arena = Arena::new();
/// let mut map = Map::new(&arena, ValueKind::Int32, ValueKind::Bool);
/// map.set(Value::Int32(1), Value::Bool(true), &arena)?;
///
/// let mut cursor = map.begin();
/// let mut seen = 0;
/// while cursor.next() {
///     assert_eq!(cursor.key(), Value::Int32(1));
///     seen += 1;
/// }
/// assert!(cursor.done());
/// assert_eq!(seen, 1);
/// # Ok::<(), erased_containers::AllocError>(())
/// ```
pub struct MapIter<'m, 'a> {
    map: &'m Map<'a>,
    inner: hash_map::Iter<'m, &'a [u8], Blob<'a>>,
    position: Position<'m, 'a>,
}

impl<'m, 'a> MapIter<'m, 'a> {
    pub(crate) fn new(map: &'m Map<'a>) -> Self {
        MapIter {
            map,
            inner: map.table.iter(),
            position: Position::Begin,
        }
    }

    /// Advances to the next entry. Returns `false` once every entry has been
    /// visited, and keeps returning `false` afterwards.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        self.position = match self.inner.next() {
            Some((&key, value)) => Position::At(key, value),
            None => Position::Done,
        };
        matches!(self.position, Position::At(..))
    }

    /// Returns `true` once the cursor has moved past the last entry.
    ///
    /// Must not be called before the first [`MapIter::next`].
    pub fn done(&self) -> bool {
        debug_assert!(
            !matches!(self.position, Position::Begin),
            "done() called before next()"
        );
        matches!(self.position, Position::Done)
    }

    /// The key of the current entry.
    ///
    /// # Panics
    ///
    /// Panics unless the last call to [`MapIter::next`] returned `true`.
    pub fn key(&self) -> Value<'a> {
        match self.position {
            // Safety: keys are packed from values of the map's key kind
            Position::At(key, _) => unsafe { unpack_key(self.map.key_kind(), key) },
            _ => panic!("map cursor is not positioned on an entry"),
        }
    }

    /// The value of the current entry.
    ///
    /// # Panics
    ///
    /// Panics unless the last call to [`MapIter::next`] returned `true`.
    pub fn value(&self) -> Value<'a> {
        match self.position {
            // Safety: values are packed from values of the map's value kind
            Position::At(_, value) => unsafe { value.unpack(self.map.value_kind()) },
            _ => panic!("map cursor is not positioned on an entry"),
        }
    }

    /// Number of entries not yet visited.
    pub fn remaining(&self) -> usize {
        self.inner.len()
    }
}

/// Iterator over the `(key, value)` pairs of a [`Map`], built on [`MapIter`].
pub struct Entries<'m, 'a> {
    cursor: MapIter<'m, 'a>,
}

impl<'m, 'a> Entries<'m, 'a> {
    pub(crate) fn new(cursor: MapIter<'m, 'a>) -> Self {
        Entries { cursor }
    }
}

impl<'a> Iterator for Entries<'_, 'a> {
    type Item = (Value<'a>, Value<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.next() {
            Some((self.cursor.key(), self.cursor.value()))
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.cursor.remaining();
        (len, Some(len))
    }
}

impl ExactSizeIterator for Entries<'_, '_> {}

impl FusedIterator for Entries<'_, '_> {}
