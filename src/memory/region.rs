//! Owned, aligned byte regions backing every allocator

use std::{
    alloc::{self, Layout},
    ptr::NonNull,
};

use super::config::RegionConfig;
use crate::error::{AllocError, Result};

/// An exclusively owned, contiguous byte buffer of fixed size
///
/// Reserved once from the global allocator and released exactly once on drop.
/// Engines address bytes inside the region by offset from [`Region::as_ptr`].
#[derive(Debug)]
pub struct Region {
    /// First byte of the region
    base: NonNull<u8>,
    /// Size and alignment the region was reserved with
    layout: Layout,
}

impl Region {
    /// Reserve a region described by `config`
    pub fn reserve(config: &RegionConfig) -> Result<Self> {
        config.validate()?;

        let layout = Layout::from_size_align(config.size, config.alignment)
            .map_err(|e| AllocError::invalid_parameter("size", e.to_string()))?;

        // SAFETY: layout has a non-zero size (checked by validate)
        let raw = unsafe {
            if config.zeroed {
                alloc::alloc_zeroed(layout)
            } else {
                alloc::alloc(layout)
            }
        };

        let base = NonNull::new(raw)
            .ok_or_else(|| AllocError::reservation(config.size, config.alignment))?;

        tracing::debug!(
            size = config.size,
            alignment = config.alignment,
            zeroed = config.zeroed,
            "reserved region"
        );

        Ok(Self { base, layout })
    }

    /// Reserve `size` bytes with the default alignment
    pub fn with_size(size: usize) -> Result<Self> {
        Self::reserve(&RegionConfig::new(size))
    }

    /// Pointer to the first byte
    pub fn as_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    /// Address of the first byte
    pub fn start_addr(&self) -> usize {
        self.base.as_ptr() as usize
    }

    /// Address one past the last byte
    pub fn end_addr(&self) -> usize {
        self.start_addr() + self.layout.size()
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// Alignment of the first byte
    pub fn alignment(&self) -> usize {
        self.layout.align()
    }

    /// Check whether `ptr` points at a byte inside the region
    pub fn contains(&self, ptr: *const u8) -> bool {
        let addr = ptr as usize;
        addr >= self.start_addr() && addr < self.end_addr()
    }

    /// Offset of `ptr` from the region start, if it lies inside the region
    pub fn offset_of(&self, ptr: *const u8) -> Option<usize> {
        self.contains(ptr).then(|| ptr as usize - self.start_addr())
    }

    /// Pointer to the byte at `offset`
    ///
    /// `offset == size()` yields the one-past-the-end pointer.
    pub fn ptr_at(&self, offset: usize) -> NonNull<u8> {
        debug_assert!(offset <= self.size());
        // SAFETY: offset is within the allocation (or one past its end), and
        // base is non-null so the sum is too
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) }
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        // SAFETY: base was returned by alloc/alloc_zeroed with this layout
        unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) };
        tracing::debug!(size = self.layout.size(), "released region");
    }
}

// SAFETY: a Region is a uniquely owned heap buffer; all interior mutation is
// coordinated by the engine that owns it
unsafe impl Send for Region {}
unsafe impl Sync for Region {}
