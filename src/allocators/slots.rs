//! Slot arrays shared by the pool allocators
//!
//! A slot array is a region cut into equal strides. While a slot is free its
//! first machine word holds the index of the next free slot (or [`NIL`]);
//! [`SlotArray::link`] is the only place that reinterprets slot memory.

use std::{
    ptr::NonNull,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use super::align_up;
use crate::{
    config::WORD_SIZE,
    error::{AllocError, Result},
    memory::{Region, RegionConfig},
    validate::{self, contract},
};

/// Link value terminating a free chain
pub(crate) const NIL: usize = usize::MAX;

#[derive(Debug)]
pub(crate) struct SlotArray {
    region: Region,
    /// Distance between consecutive slots
    stride: usize,
    count: usize,
    /// Per-slot liveness, kept only while contract checks are compiled in
    live: Option<Box<[AtomicBool]>>,
}

impl SlotArray {
    /// Reserve `block_count` slots of at least `block_size` bytes, each
    /// starting on an `alignment` boundary, and chain them in address order
    pub fn new(block_size: usize, block_count: usize, alignment: usize) -> Result<Self> {
        if block_size < WORD_SIZE {
            return Err(AllocError::invalid_parameter(
                "block_size",
                format!("Block size must be at least {} bytes", WORD_SIZE),
            ));
        }

        if block_count == 0 {
            return Err(AllocError::invalid_parameter(
                "block_count",
                "Block count must be greater than 0",
            ));
        }

        // Reject a bad alignment before it is used for rounding
        RegionConfig::new(block_size)
            .with_alignment(alignment)
            .validate()?;

        let stride = align_up(block_size, alignment).ok_or_else(|| {
            AllocError::invalid_parameter("block_size", "Block size overflows when aligned")
        })?;
        let size = stride.checked_mul(block_count).ok_or_else(|| {
            AllocError::invalid_parameter("block_count", "Pool size overflows usize")
        })?;

        let region = Region::reserve(&RegionConfig::new(size).with_alignment(alignment))?;

        let live = validate::ENABLED.then(|| {
            (0..block_count)
                .map(|_| AtomicBool::new(false))
                .collect::<Box<[_]>>()
        });

        let slots = Self {
            region,
            stride,
            count: block_count,
            live,
        };

        for index in 0..block_count {
            let next = if index + 1 < block_count { index + 1 } else { NIL };
            // SAFETY: index < count
            unsafe { slots.link(index) }.store(next, Ordering::Relaxed);
        }

        Ok(slots)
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    /// The free-chain link stored in slot `index`
    ///
    /// # Safety
    /// `index < count`. The word is only meaningful while the slot is free;
    /// a concurrent reader may observe whatever the slot's owner wrote.
    pub unsafe fn link(&self, index: usize) -> &AtomicUsize {
        debug_assert!(index < self.count);
        &*self.region.as_ptr().add(index * self.stride).cast::<AtomicUsize>()
    }

    /// Pointer to the first byte of slot `index`
    pub fn ptr(&self, index: usize) -> NonNull<u8> {
        self.region.ptr_at(index * self.stride)
    }

    /// Index of the slot starting at `ptr`
    ///
    /// The pointer is trusted unless contract checks are compiled in.
    pub fn index_of(&self, ptr: *mut u8) -> usize {
        let offset = (ptr as usize).wrapping_sub(self.region.start_addr());
        contract!(
            offset < self.region.size(),
            "pointer {:p} does not belong to this pool",
            ptr
        );
        contract!(
            offset % self.stride == 0,
            "pointer {:p} is not on a slot boundary",
            ptr
        );
        offset / self.stride
    }

    /// Check whether `ptr` is the start of one of this array's slots
    pub fn is_slot(&self, ptr: *const u8) -> bool {
        self.region
            .offset_of(ptr)
            .is_some_and(|offset| offset % self.stride == 0)
    }

    /// Record that slot `index` was handed to a caller
    pub fn track_allocate(&self, index: usize) {
        if let Some(live) = &self.live {
            let was_live = live[index].swap(true, Ordering::Relaxed);
            contract!(!was_live, "slot {} handed out while still live", index);
        }
    }

    /// Record that slot `index` came back from a caller
    pub fn track_release(&self, index: usize) {
        if let Some(live) = &self.live {
            let was_live = live[index].swap(false, Ordering::Relaxed);
            contract!(was_live, "slot {} released twice", index);
        }
    }
}
