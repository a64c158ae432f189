//! Bump arena that owns every byte of container memory
//!
//! Allocations are carved from a list of blocks obtained from the global
//! allocator. Nothing is freed individually: all blocks are returned when the
//! arena is dropped, which bounds the lifetime of every container built on it.

use std::alloc::{alloc, dealloc, Layout};
use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug, Formatter};
use std::ptr::{self, NonNull};

use tracing::{debug, trace};

use crate::alloc::AllocError;
use crate::config::ArenaConfig;
use crate::error::ContainerError;

/// Alignment of every block, and therefore the largest alignment that never
/// wastes the tail of a fresh block.
const BLOCK_ALIGN: usize = 16;

struct Block {
    ptr: NonNull<u8>,
    layout: Layout,
}

/// A region allocator.
///
/// The arena is single-threaded (`!Sync`): containers borrow it for their
/// whole lifetime and allocate through a shared reference.
pub struct Arena {
    config: ArenaConfig,
    blocks: RefCell<Vec<Block>>,
    /// Next free byte of the current block (null before the first block).
    ptr: Cell<*mut u8>,
    /// One past the last byte of the current block.
    end: Cell<*mut u8>,
    /// Start of the most recent allocation, which may be extended in place.
    last: Cell<*mut u8>,
    next_block_size: Cell<usize>,
    space_allocated: Cell<usize>,
}

impl Arena {
    /// Constructs an arena with the default configuration. Does not allocate.
    #[must_use]
    pub fn new() -> Self {
        Self::build(ArenaConfig::default())
    }

    /// Constructs an arena with the given configuration. Does not allocate.
    pub fn with_config(config: ArenaConfig) -> Result<Self, ContainerError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ArenaConfig) -> Self {
        Arena {
            next_block_size: Cell::new(config.initial_block_size),
            config,
            blocks: RefCell::new(Vec::new()),
            ptr: Cell::new(ptr::null_mut()),
            end: Cell::new(ptr::null_mut()),
            last: Cell::new(ptr::null_mut()),
            space_allocated: Cell::new(0),
        }
    }

    /// The configuration this arena was built with.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Total bytes of blocks currently held by the arena.
    pub fn space_allocated(&self) -> usize {
        self.space_allocated.get()
    }

    /// Allocates uninitialized memory for `layout`.
    ///
    /// The memory stays valid until the arena is dropped.
    pub fn alloc(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            // Safety: alignments are non-zero
            return Ok(unsafe { NonNull::new_unchecked(layout.align() as *mut u8) });
        }
        if let Some(ptr) = self.bump(layout) {
            return Ok(ptr);
        }
        self.new_block(layout)?;
        self.bump(layout).ok_or(AllocError)
    }

    /// Resizes an allocation, preserving its first `min(old_size, new_size)`
    /// bytes.
    ///
    /// Shrinking never moves. Growing extends in place when `ptr` is the most
    /// recent allocation and the current block has room; otherwise the bytes
    /// are copied to a fresh allocation and the old one is abandoned.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of `old_size` bytes, and if it came from
    /// this arena, `old_size` must not exceed the size it was allocated with.
    pub unsafe fn realloc(
        &self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
        align: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        if new_size <= old_size {
            return Ok(ptr);
        }
        if old_size > 0 && ptr.as_ptr() == self.last.get() {
            let fits = (ptr.as_ptr() as usize)
                .checked_add(new_size)
                .map_or(false, |end| end <= self.end.get() as usize);
            if fits {
                self.ptr.set(ptr.as_ptr().add(new_size));
                return Ok(ptr);
            }
        }
        let layout = Layout::from_size_align(new_size, align).map_err(|_| AllocError)?;
        let new_ptr = self.alloc(layout)?;
        ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), old_size);
        Ok(new_ptr)
    }

    /// Copies `bytes` into the arena.
    pub fn copy_bytes(&self, bytes: &[u8]) -> Result<&[u8], AllocError> {
        if bytes.is_empty() {
            return Ok(&[]);
        }
        let ptr = self.alloc(Layout::for_value(bytes))?;
        // Safety: we just allocated `bytes.len()` bytes
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len());
            Ok(std::slice::from_raw_parts(ptr.as_ptr(), bytes.len()))
        }
    }

    /// Copies `s` into the arena.
    pub fn copy_str(&self, s: &str) -> Result<&str, AllocError> {
        let bytes = self.copy_bytes(s.as_bytes())?;
        // Safety: copied from a `str`
        Ok(unsafe { std::str::from_utf8_unchecked(bytes) })
    }

    fn bump(&self, layout: Layout) -> Option<NonNull<u8>> {
        let ptr = self.ptr.get();
        if ptr.is_null() {
            return None;
        }
        let addr = ptr as usize;
        let mask = layout.align() - 1;
        let start = addr.checked_add(mask)? & !mask;
        let end = start.checked_add(layout.size())?;
        if end > self.end.get() as usize {
            return None;
        }
        // Safety: `start..end` lies within the current block
        unsafe {
            let start_ptr = ptr.add(start - addr);
            self.ptr.set(start_ptr.add(layout.size()));
            self.last.set(start_ptr);
            Some(NonNull::new_unchecked(start_ptr))
        }
    }

    fn new_block(&self, layout: Layout) -> Result<(), AllocError> {
        let align = layout.align().max(BLOCK_ALIGN);
        let regular = self.next_block_size.get();
        let mut size = regular.max(layout.size());
        let used = self.space_allocated.get();

        if let Some(limit) = self.config.max_bytes {
            let remaining = limit.saturating_sub(used);
            if size > remaining {
                if layout.size() > remaining {
                    debug!(
                        requested = layout.size(),
                        allocated = used,
                        limit,
                        "arena allocation refused"
                    );
                    return Err(AllocError);
                }
                size = remaining;
            }
        }

        let block_layout =
            Layout::from_size_align(size, align).map_err(|_| AllocError)?;
        // Safety: `size` is non-zero because `layout.size()` is
        let ptr = match NonNull::new(unsafe { alloc(block_layout) }) {
            Some(ptr) => ptr,
            None => {
                debug!(size, "global allocator refused arena block");
                return Err(AllocError);
            }
        };

        self.blocks.borrow_mut().push(Block {
            ptr,
            layout: block_layout,
        });
        self.space_allocated.set(used + size);
        self.ptr.set(ptr.as_ptr());
        // Safety: one past the end of the block
        self.end.set(unsafe { ptr.as_ptr().add(size) });
        self.last.set(ptr::null_mut());
        if size == regular {
            let next = regular
                .saturating_mul(2)
                .min(self.config.max_block_size)
                .max(regular);
            self.next_block_size.set(next);
        }
        trace!(size, total = used + size, "arena acquired block");
        Ok(())
    }

    #[cfg(test)]
    fn block_count(&self) -> usize {
        self.blocks.borrow().len()
    }

    #[cfg(test)]
    pub(crate) fn bytes_free(&self) -> usize {
        self.end.get() as usize - self.ptr.get() as usize
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        for block in self.blocks.get_mut().drain(..) {
            // Safety: allocated in `new_block` with this layout
            unsafe { dealloc(block.ptr.as_ptr(), block.layout) };
        }
    }
}

impl Debug for Arena {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("blocks", &self.blocks.borrow().len())
            .field("space_allocated", &self.space_allocated.get())
            .field("max_bytes", &self.config.max_bytes)
            .finish()
    }
}

/// Adapter that lets collections parameterized over an allocator (such as the
/// keyed table behind [`Map`](crate::Map)) draw their memory from an arena.
///
/// Deallocation is a no-op; the memory is reclaimed with the arena.
#[derive(Copy, Clone, Debug)]
pub struct ArenaAlloc<'a>(pub &'a Arena);

unsafe impl allocator_api2::alloc::Allocator for ArenaAlloc<'_> {
    fn allocate(
        &self,
        layout: Layout,
    ) -> Result<NonNull<[u8]>, allocator_api2::alloc::AllocError> {
        match self.0.alloc(layout) {
            Ok(ptr) => Ok(NonNull::slice_from_raw_parts(ptr, layout.size())),
            Err(AllocError) => Err(allocator_api2::alloc::AllocError),
        }
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {}
}
