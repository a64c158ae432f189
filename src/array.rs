//! Functionality relating to the repeated field container

use std::alloc::Layout;
use std::cmp;
use std::fmt::{self, Debug, Formatter};
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use crate::alloc::AllocError;
use crate::arena::Arena;
use crate::kind::ValueKind;
use crate::value::Value;

/// Number of elements allocated up front by [`Array::new`].
const INITIAL_CAPACITY: usize = 4;

/// Alignment requested for element storage. Elements are read and written
/// bytewise, so this only keeps scalar slots naturally aligned.
const ELEMENT_ALIGN: usize = 8;

/// The `Array` type is a growable sequence of values of a single
/// [`ValueKind`], stored as raw bytes in arena memory.
///
/// Every element occupies exactly `1 << size_lg2()` bytes. The array never
/// inspects what those bytes mean; the kind is only used to encode and decode
/// [`Value`]s at the boundary. All memory belongs to the arena, so there is no
/// destructor: the array simply stops being usable when the arena goes away.
pub struct Array<'a> {
    data: NonNull<u8>,
    len: usize,
    cap: usize,
    lg2: u8,
    kind: ValueKind,
    _arena: PhantomData<&'a Arena>,
}

impl<'a> Array<'a> {
    fn layout(cap: usize, lg2: u8) -> Result<Layout, AllocError> {
        let size = cap.checked_mul(1usize << lg2).ok_or(AllocError)?;
        Layout::from_size_align(size, ELEMENT_ALIGN).map_err(|_| AllocError)
    }

    /// Constructs a new empty array for values of `kind`, with room for four
    /// elements.
    pub fn new(arena: &'a Arena, kind: ValueKind) -> Result<Self, AllocError> {
        let lg2 = kind.size_lg2();
        let data = arena.alloc(Self::layout(INITIAL_CAPACITY, lg2)?)?;
        Ok(Array {
            data,
            len: 0,
            cap: INITIAL_CAPACITY,
            lg2,
            kind,
            _arena: PhantomData,
        })
    }

    /// Returns the number of elements in the array.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the array is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The kind of value this array holds.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Log2 of the element width in bytes.
    #[must_use]
    pub fn size_lg2(&self) -> u8 {
        self.lg2
    }

    fn element_size(&self) -> usize {
        1usize << self.lg2
    }

    // Safety: `index` must not exceed the capacity
    unsafe fn slot(&self, index: usize) -> *mut u8 {
        self.data.as_ptr().add(index << self.lg2)
    }

    /// Returns the element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    #[must_use]
    pub fn get(&self, index: usize) -> Value<'a> {
        assert!(
            index < self.len,
            "index {} out of bounds for array of length {}",
            index,
            self.len
        );
        // Safety: bounds checked above
        unsafe { self.get_unchecked(index) }
    }

    /// Returns the element at `index` without a release-mode bounds check.
    ///
    /// # Safety
    ///
    /// `index` must be less than `len()`.
    #[must_use]
    pub unsafe fn get_unchecked(&self, index: usize) -> Value<'a> {
        debug_assert!(index < self.len);
        let bytes = std::slice::from_raw_parts(self.slot(index), self.element_size());
        // Safety: every slot below `len` is zeroed or was written by `set`
        Value::from_raw(self.kind, bytes)
    }

    /// Overwrites the element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()` or if `value` is not of this array's kind.
    pub fn set(&mut self, index: usize, value: Value<'a>) {
        assert!(
            index < self.len,
            "index {} out of bounds for array of length {}",
            index,
            self.len
        );
        self.check_kind(&value);
        // Safety: bounds and kind checked above
        unsafe { self.set_unchecked(index, value) }
    }

    /// Overwrites the element at `index` without release-mode checks.
    ///
    /// # Safety
    ///
    /// `index` must be less than `len()` and `value.kind()` must equal
    /// `kind()`.
    pub unsafe fn set_unchecked(&mut self, index: usize, value: Value<'a>) {
        debug_assert!(index < self.len);
        debug_assert_eq!(value.kind(), self.kind);
        let raw = value.to_raw();
        ptr::copy_nonoverlapping(
            raw.as_bytes().as_ptr(),
            self.slot(index),
            self.element_size(),
        );
    }

    fn check_kind(&self, value: &Value<'a>) {
        assert_eq!(
            value.kind(),
            self.kind,
            "value kind does not match array kind"
        );
    }

    fn reserve(
        &mut self,
        desired_capacity: usize,
        arena: &'a Arena,
    ) -> Result<(), AllocError> {
        if self.cap >= desired_capacity {
            return Ok(());
        }
        let mut new_cap = cmp::max(self.cap, INITIAL_CAPACITY);
        while new_cap < desired_capacity {
            new_cap = new_cap.checked_mul(2).ok_or(AllocError)?;
        }
        let old_layout = Self::layout(self.cap, self.lg2)?;
        let new_layout = Self::layout(new_cap, self.lg2)?;
        // Safety: `data` holds `cap` elements
        let data = unsafe {
            arena.realloc(
                self.data,
                old_layout.size(),
                new_layout.size(),
                ELEMENT_ALIGN,
            )?
        };
        self.data = data;
        self.cap = new_cap;
        Ok(())
    }

    /// Changes the length of the array.
    ///
    /// Growing past the capacity reallocates through `arena`, at least
    /// doubling the capacity, and preserves the existing elements. Newly
    /// exposed elements read as the zero value of the kind. Shrinking never
    /// reallocates. On failure the array is unchanged.
    pub fn resize(&mut self, new_len: usize, arena: &'a Arena) -> Result<(), AllocError> {
        self.reserve(new_len, arena)?;
        if new_len > self.len {
            // Safety: capacity covers `new_len`
            unsafe {
                let fresh = (new_len - self.len) << self.lg2;
                ptr::write_bytes(self.slot(self.len), 0, fresh);
            }
        }
        self.len = new_len;
        Ok(())
    }

    /// Shortens the array to `len` elements. Does nothing if the array is
    /// already that short. The capacity is unchanged.
    pub fn truncate(&mut self, len: usize) {
        if len < self.len {
            self.len = len;
        }
    }

    /// Pushes a new value onto the back of the array.
    ///
    /// # Panics
    ///
    /// Panics if `value` is not of this array's kind.
    pub fn append(&mut self, value: Value<'a>, arena: &'a Arena) -> Result<(), AllocError> {
        self.check_kind(&value);
        self.resize(self.len + 1, arena)?;
        // Safety: the array just grew by one and the kind was checked
        unsafe { self.set_unchecked(self.len - 1, value) };
        Ok(())
    }

    /// Moves `count` elements starting at `src` so they start at `dst`. The
    /// ranges may overlap. Elements outside the destination range keep their
    /// previous contents.
    ///
    /// # Panics
    ///
    /// Panics if either range extends past `len()`.
    pub fn move_elements(&mut self, dst: usize, src: usize, count: usize) {
        assert!(
            self.range_in_bounds(dst, count) && self.range_in_bounds(src, count),
            "move of {} elements from {} to {} out of bounds for array of length {}",
            count,
            src,
            dst,
            self.len
        );
        // Safety: both ranges checked above
        unsafe { self.move_unchecked(dst, src, count) }
    }

    fn range_in_bounds(&self, start: usize, count: usize) -> bool {
        start
            .checked_add(count)
            .map_or(false, |end| end <= self.len)
    }

    // Safety: both ranges must lie within `len`
    unsafe fn move_unchecked(&mut self, dst: usize, src: usize, count: usize) {
        ptr::copy(self.slot(src), self.slot(dst), count << self.lg2);
    }

    /// Opens a gap of `count` elements at `index`, shifting the elements on
    /// or after `index` towards the back.
    ///
    /// The contents of the gap are unspecified (they are valid values of the
    /// array's kind, but not necessarily zero); callers are expected to `set`
    /// each new element. On failure the array is unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    pub fn insert(
        &mut self,
        index: usize,
        count: usize,
        arena: &'a Arena,
    ) -> Result<(), AllocError> {
        assert!(
            index <= self.len,
            "insertion index {} out of bounds for array of length {}",
            index,
            self.len
        );
        let old_len = self.len;
        let new_len = old_len.checked_add(count).ok_or(AllocError)?;
        self.resize(new_len, arena)?;
        // Safety: `index + count + (old_len - index) == new_len`
        unsafe { self.move_unchecked(index + count, index, old_len - index) };
        Ok(())
    }

    /// Removes `count` elements starting at `index`, shifting the following
    /// elements towards the front. Never allocates.
    ///
    /// # Panics
    ///
    /// Panics if `index + count > len()`.
    pub fn delete(&mut self, index: usize, count: usize) {
        assert!(
            self.range_in_bounds(index, count),
            "deletion of {} elements at {} out of bounds for array of length {}",
            count,
            index,
            self.len
        );
        let end = index + count;
        // Safety: `end..len` and `index..len - count` are within bounds
        unsafe { self.move_unchecked(index, end, self.len - end) };
        self.len -= count;
    }

    /// The raw bytes of the elements, `len() << size_lg2()` long.
    ///
    /// Scalars are native-endian, so a codec can emit packed fields of
    /// fixed-width kinds straight from this slice on little-endian targets.
    #[must_use]
    pub fn as_raw_bytes(&self) -> &[u8] {
        // Safety: every byte below `len` elements is initialized
        unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.len << self.lg2) }
    }

    /// Returns an iterator over the elements.
    pub fn iter(&self) -> Iter<'_, 'a> {
        Iter {
            array: self,
            front: 0,
            back: self.len,
        }
    }
}

impl Debug for Array<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Iterator over the elements of an [`Array`], returned from [`Array::iter`]
#[derive(Clone)]
pub struct Iter<'s, 'a> {
    array: &'s Array<'a>,
    front: usize,
    back: usize,
}

impl<'a> Iterator for Iter<'_, 'a> {
    type Item = Value<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            None
        } else {
            // Safety: `front < back <= len`
            let value = unsafe { self.array.get_unchecked(self.front) };
            self.front += 1;
            Some(value)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.back - self.front;
        (len, Some(len))
    }
}

impl DoubleEndedIterator for Iter<'_, '_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            None
        } else {
            self.back -= 1;
            // Safety: `front <= back < len`
            Some(unsafe { self.array.get_unchecked(self.back) })
        }
    }
}

impl ExactSizeIterator for Iter<'_, '_> {}
impl FusedIterator for Iter<'_, '_> {}

impl<'s, 'a> IntoIterator for &'s Array<'a> {
    type Item = Value<'a>;
    type IntoIter = Iter<'s, 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArenaConfig;
    use crate::value::MessageRef;

    fn i32s(arr: &Array<'_>) -> Vec<i32> {
        arr.iter().map(|v| v.as_i32().unwrap()).collect()
    }

    fn sample(kind: ValueKind, seed: u8) -> Value<'static> {
        static MESSAGES: [u64; 4] = [0; 4];
        static TEXT: [&str; 4] = ["", "a", "bc", "def"];
        let i = usize::from(seed % 4);
        match kind {
            ValueKind::Bool => Value::Bool(seed % 2 == 1),
            ValueKind::Float => Value::Float(f32::from(seed) * 0.5),
            ValueKind::Int32 => Value::Int32(-i32::from(seed)),
            ValueKind::UInt32 => Value::UInt32(u32::from(seed) << 24),
            ValueKind::Enum => Value::Enum(i32::from(seed)),
            ValueKind::Message => Value::Message(MessageRef::new(&MESSAGES[i])),
            ValueKind::Double => Value::Double(f64::from(seed) * -1.25),
            ValueKind::Int64 => Value::Int64(-(i64::from(seed) << 40)),
            ValueKind::UInt64 => Value::UInt64(u64::from(seed) << 56),
            ValueKind::String => Value::String(TEXT[i]),
            ValueKind::Bytes => Value::Bytes(TEXT[i].as_bytes()),
        }
    }

    #[mockalloc::test]
    fn can_create() {
        let arena = Arena::new();
        let arr = Array::new(&arena, ValueKind::Int32).unwrap();
        assert_eq!(arr.len(), 0);
        assert!(arr.is_empty());
        assert_eq!(arr.kind(), ValueKind::Int32);
        assert_eq!(arr.size_lg2(), 2);
    }

    #[mockalloc::test]
    fn can_insert_set_delete() {
        let arena = Arena::new();
        let mut arr = Array::new(&arena, ValueKind::Int32).unwrap();
        for v in [10, 20, 30] {
            arr.append(Value::Int32(v), &arena).unwrap();
        }
        arr.insert(1, 1, &arena).unwrap();
        arr.set(1, Value::Int32(99));
        assert_eq!(i32s(&arr), [10, 99, 20, 30]);

        arr.delete(0, 2);
        assert_eq!(i32s(&arr), [20, 30]);
    }

    #[mockalloc::test]
    fn append_then_get_for_every_kind() {
        let arena = Arena::new();
        for kind in ValueKind::ALL {
            let mut arr = Array::new(&arena, kind).unwrap();
            for seed in 0..10 {
                let value = sample(kind, seed);
                arr.append(value, &arena).unwrap();
                assert_eq!(arr.get(arr.len() - 1), value, "{:?}", kind);
            }
            // Earlier elements survive the reallocations
            for seed in 0..10u8 {
                assert_eq!(arr.get(usize::from(seed)), sample(kind, seed));
            }
            assert_eq!(arr.as_raw_bytes().len(), 10 * kind.element_size());
        }
    }

    #[mockalloc::test]
    fn set_round_trips() {
        let arena = Arena::new();
        let mut arr = Array::new(&arena, ValueKind::Double).unwrap();
        arr.resize(6, &arena).unwrap();
        for i in 0..6 {
            arr.set(i, Value::Double(i as f64 + 0.5));
        }
        arr.set(3, Value::Double(-8.0));
        assert_eq!(arr.get(3), Value::Double(-8.0));
        assert_eq!(arr.get(2), Value::Double(2.5));
        assert_eq!(arr.get(4), Value::Double(4.5));
    }

    #[mockalloc::test]
    fn resize_zero_fills_new_elements() {
        let arena = Arena::new();
        let mut arr = Array::new(&arena, ValueKind::Int64).unwrap();
        arr.append(Value::Int64(5), &arena).unwrap();
        arr.append(Value::Int64(6), &arena).unwrap();
        arr.resize(1, &arena).unwrap();
        assert_eq!(arr.len(), 1);
        arr.resize(20, &arena).unwrap();
        assert_eq!(arr.get(0), Value::Int64(5));
        assert!(arr.iter().skip(1).all(|v| v == Value::Int64(0)));

        let mut strings = Array::new(&arena, ValueKind::String).unwrap();
        strings.resize(3, &arena).unwrap();
        assert!(strings.iter().all(|v| v == Value::String("")));
    }

    #[mockalloc::test]
    fn can_truncate() {
        let arena = Arena::new();
        let mut arr = Array::new(&arena, ValueKind::Bool).unwrap();
        for b in [true, false, true] {
            arr.append(Value::Bool(b), &arena).unwrap();
        }
        arr.truncate(5);
        assert_eq!(arr.len(), 3);
        arr.truncate(1);
        assert_eq!(arr.len(), 1);
        assert_eq!(arr.get(0), Value::Bool(true));
    }

    #[mockalloc::test]
    fn move_handles_overlap() {
        let arena = Arena::new();
        let mut arr = Array::new(&arena, ValueKind::UInt32).unwrap();
        for v in 0..8u32 {
            arr.append(Value::UInt32(v), &arena).unwrap();
        }
        arr.move_elements(2, 0, 5);
        let got: Vec<u32> = arr.iter().map(|v| v.as_u32().unwrap()).collect();
        assert_eq!(got, [0, 1, 0, 1, 2, 3, 4, 7]);

        arr.move_elements(0, 3, 5);
        let got: Vec<u32> = arr.iter().map(|v| v.as_u32().unwrap()).collect();
        assert_eq!(got, [1, 2, 3, 4, 7, 3, 4, 7]);

        arr.move_elements(8, 8, 0);
    }

    #[mockalloc::test]
    fn insert_then_delete_restores_bytes() {
        let arena = Arena::new();
        let mut arr = Array::new(&arena, ValueKind::Int32).unwrap();
        for v in 0..7 {
            arr.append(Value::Int32(v * 3), &arena).unwrap();
        }
        let before = arr.as_raw_bytes().to_vec();
        for index in 0..=arr.len() {
            for count in 0..4 {
                arr.insert(index, count, &arena).unwrap();
                assert_eq!(arr.len(), 7 + count);
                arr.delete(index, count);
                assert_eq!(arr.as_raw_bytes(), &before[..]);
            }
        }
    }

    #[mockalloc::test]
    fn delete_then_reinsert_restores_contents() {
        let arena = Arena::new();
        let mut arr = Array::new(&arena, ValueKind::Int32).unwrap();
        for v in [4, 8, 15, 16, 23, 42] {
            arr.append(Value::Int32(v), &arena).unwrap();
        }
        arr.delete(1, 3);
        assert_eq!(i32s(&arr), [4, 23, 42]);
        arr.insert(1, 3, &arena).unwrap();
        for (i, v) in [8, 15, 16].into_iter().enumerate() {
            arr.set(1 + i, Value::Int32(v));
        }
        assert_eq!(i32s(&arr), [4, 8, 15, 16, 23, 42]);
    }

    #[mockalloc::test]
    fn insert_at_end_and_empty_ranges() {
        let arena = Arena::new();
        let mut arr = Array::new(&arena, ValueKind::Int32).unwrap();
        arr.insert(0, 0, &arena).unwrap();
        assert!(arr.is_empty());
        arr.insert(0, 2, &arena).unwrap();
        arr.set(0, Value::Int32(1));
        arr.set(1, Value::Int32(2));
        arr.insert(2, 1, &arena).unwrap();
        arr.set(2, Value::Int32(3));
        assert_eq!(i32s(&arr), [1, 2, 3]);
        arr.delete(3, 0);
        arr.delete(0, 3);
        assert!(arr.is_empty());
    }

    #[mockalloc::test]
    fn stores_arena_strings() {
        let arena = Arena::new();
        let mut arr = Array::new(&arena, ValueKind::String).unwrap();
        for word in ["alpha", "beta", "gamma"] {
            let owned = word.to_uppercase();
            let copy = arena.copy_str(&owned).unwrap();
            arr.append(Value::String(copy), &arena).unwrap();
        }
        arr.delete(0, 1);
        let got: Vec<&str> = arr.iter().map(|v| v.as_str().unwrap()).collect();
        assert_eq!(got, ["BETA", "GAMMA"]);
        assert_eq!(format!("{:?}", arr), r#"[String("BETA"), String("GAMMA")]"#);
    }

    #[mockalloc::test]
    fn iterates_both_ends() {
        let arena = Arena::new();
        let mut arr = Array::new(&arena, ValueKind::Enum).unwrap();
        for v in 1..=4 {
            arr.append(Value::Enum(v), &arena).unwrap();
        }
        let mut iter = arr.iter();
        assert_eq!(iter.len(), 4);
        assert_eq!(iter.next(), Some(Value::Enum(1)));
        assert_eq!(iter.next_back(), Some(Value::Enum(4)));
        assert_eq!(iter.len(), 2);
        let rest: Vec<_> = iter.collect();
        assert_eq!(rest, [Value::Enum(2), Value::Enum(3)]);
    }

    #[test]
    fn allocation_failure_leaves_array_unchanged() {
        let config = ArenaConfig::new()
            .with_initial_block_size(16)
            .with_max_block_size(16)
            .with_max_bytes(16);
        let arena = Arena::with_config(config).unwrap();
        let mut arr = Array::new(&arena, ValueKind::Int32).unwrap();
        for v in 0..4 {
            arr.append(Value::Int32(v), &arena).unwrap();
        }
        let before = arr.as_raw_bytes().to_vec();

        assert_eq!(arr.append(Value::Int32(4), &arena), Err(AllocError));
        assert_eq!(arr.insert(2, 1, &arena), Err(AllocError));
        assert_eq!(arr.resize(100, &arena), Err(AllocError));
        assert_eq!(arr.len(), 4);
        assert_eq!(arr.as_raw_bytes(), &before[..]);

        // Shrinking and deleting still work without memory
        arr.resize(3, &arena).unwrap();
        arr.delete(0, 1);
        assert_eq!(i32s(&arr), [1, 2]);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn get_past_end_panics() {
        let arena = Arena::new();
        let mut arr = Array::new(&arena, ValueKind::Int32).unwrap();
        arr.append(Value::Int32(1), &arena).unwrap();
        let _ = arr.get(1);
    }

    #[test]
    #[should_panic(expected = "value kind does not match")]
    fn set_wrong_kind_panics() {
        let arena = Arena::new();
        let mut arr = Array::new(&arena, ValueKind::Int32).unwrap();
        arr.resize(1, &arena).unwrap();
        arr.set(0, Value::Int64(1));
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn insert_past_end_panics() {
        let arena = Arena::new();
        let mut arr = Array::new(&arena, ValueKind::Int32).unwrap();
        let _ = arr.insert(1, 1, &arena);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn delete_past_end_panics() {
        let arena = Arena::new();
        let mut arr = Array::new(&arena, ValueKind::Int32).unwrap();
        arr.resize(2, &arena).unwrap();
        arr.delete(1, 2);
    }

    // Too slow for miri
    #[cfg(not(miri))]
    #[mockalloc::test]
    fn stress_test() {
        use rand::prelude::*;

        for i in 0..10 {
            // We want our test to be random but for errors to be reproducible
            let mut rng = StdRng::seed_from_u64(i);
            let arena = Arena::new();
            let mut arr = Array::new(&arena, ValueKind::Int64).unwrap();
            let mut model: Vec<i64> = Vec::new();

            for j in 0..1000 {
                let index = rng.gen_range(0..model.len() + 1);
                let count = rng.gen_range(0..4usize);
                if rng.gen() {
                    arr.insert(index, count, &arena).unwrap();
                    for k in 0..count {
                        arr.set(index + k, Value::Int64(j));
                        model.insert(index + k, j);
                    }
                } else {
                    let count = count.min(model.len() - index);
                    arr.delete(index, count);
                    model.drain(index..index + count);
                }
                assert_eq!(arr.len(), model.len());
            }
            let got: Vec<i64> = arr.iter().map(|v| v.as_i64().unwrap()).collect();
            assert_eq!(got, model);
        }
    }
}
