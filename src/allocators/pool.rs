//! Pool allocator implementation - fixed-size block allocation

use std::{ptr::NonNull, sync::atomic::Ordering};

use super::{
    slots::{SlotArray, NIL},
    traits::{Allocator, AllocatorCapabilities},
};
use crate::{config::DEFAULT_ALIGNMENT, error::Result, validate::contract};

/// Pool allocator for fixed-size blocks
///
/// Hands out equal-size slots from a single region in O(1). Free slots are
/// chained through their own first word, so bookkeeping costs no memory and
/// fragmentation cannot occur.
///
/// Single-threaded: allocation and release take `&mut self`. Use
/// [`ConcurrentPoolAllocator`](super::ConcurrentPoolAllocator) when several
/// threads share one pool.
#[derive(Debug)]
pub struct PoolAllocator {
    /// Backing slots
    slots: SlotArray,
    /// Index of the first free slot
    free_head: usize,
    /// Number of allocated blocks
    allocated: usize,
}

impl PoolAllocator {
    /// Create a pool of `block_count` blocks of `block_size` bytes
    ///
    /// `block_size` must be able to hold a pointer and `block_count` must be
    /// non-zero.
    pub fn new(block_size: usize, block_count: usize) -> Result<Self> {
        Self::with_alignment(block_size, block_count, DEFAULT_ALIGNMENT)
    }

    /// Create a pool whose blocks all start on an `alignment` boundary
    ///
    /// The block stride is rounded up to a multiple of `alignment`.
    pub fn with_alignment(block_size: usize, block_count: usize, alignment: usize) -> Result<Self> {
        let slots = SlotArray::new(block_size, block_count, alignment)?;

        tracing::debug!(
            block_size = slots.stride(),
            block_count,
            alignment,
            "created pool allocator"
        );

        Ok(Self {
            slots,
            free_head: 0,
            allocated: 0,
        })
    }

    /// Allocate a single block
    ///
    /// Returns `None` once every block is in use.
    pub fn allocate(&mut self) -> Option<NonNull<u8>> {
        let index = self.free_head;
        if index == NIL {
            tracing::trace!(capacity = self.capacity(), "pool exhausted");
            return None;
        }

        // SAFETY: chain entries are always valid slot indices
        self.free_head = unsafe { self.slots.link(index) }.load(Ordering::Relaxed);
        self.allocated += 1;
        self.slots.track_allocate(index);

        Some(self.slots.ptr(index))
    }

    /// Return a block to the pool. A null pointer is ignored.
    ///
    /// # Safety
    /// `ptr` must be null or a block returned by [`allocate`](Self::allocate)
    /// on this pool that has not been released since. The block's contents
    /// are overwritten.
    pub unsafe fn release(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }

        contract!(self.allocated > 0, "release on a pool with no live blocks");
        let index = self.slots.index_of(ptr);
        self.slots.track_release(index);

        self.slots.link(index).store(self.free_head, Ordering::Relaxed);
        self.free_head = index;
        self.allocated -= 1;
    }

    /// Get block size (the stride between blocks)
    pub fn block_size(&self) -> usize {
        self.slots.stride()
    }

    /// Get total number of blocks
    pub fn capacity(&self) -> usize {
        self.slots.count()
    }

    /// Get number of allocated blocks
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    /// Get number of free blocks
    pub fn available(&self) -> usize {
        self.capacity() - self.allocated
    }

    /// Check if every block is in use
    pub fn is_full(&self) -> bool {
        self.allocated >= self.capacity()
    }

    /// Check if no block is in use
    pub fn is_empty(&self) -> bool {
        self.allocated == 0
    }
}

impl Allocator for PoolAllocator {
    fn total_size(&self) -> usize {
        self.slots.region().size()
    }

    fn used_size(&self) -> usize {
        self.allocated * self.block_size()
    }

    fn owns(&self, ptr: NonNull<u8>) -> bool {
        self.slots.is_slot(ptr.as_ptr())
    }

    fn capabilities(&self) -> AllocatorCapabilities {
        AllocatorCapabilities::default()
    }
}

impl Drop for PoolAllocator {
    fn drop(&mut self) {
        if self.allocated > 0 {
            tracing::warn!(live = self.allocated, "pool allocator dropped with live blocks");
        }
    }
}
