//! Stack allocator implementation - bump allocation with marker-based rewind

use std::{
    ops::{Deref, DerefMut},
    ptr::NonNull,
};

use super::{
    align_up,
    traits::{Allocator, AllocatorCapabilities},
};
use crate::{
    error::Result,
    memory::{Region, RegionConfig},
    validate::contract,
};

/// Saved cursor position of a [`StackAllocator`]
///
/// Only meaningful to the allocator that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackMarker {
    offset: usize,
    /// Start address of the issuing allocator's region
    origin: usize,
}

impl StackMarker {
    /// Bytes in use when the marker was taken
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Linear allocator with LIFO rewind
///
/// Allocation bumps a cursor through the region; nothing is released
/// individually. Memory comes back in bulk through [`reset`](Self::reset) or
/// by rewinding to a [`StackMarker`], and the caller must not touch anything
/// allocated after the point it rewinds to.
#[derive(Debug)]
pub struct StackAllocator {
    /// Backing memory
    region: Region,
    /// Offset of the first unused byte
    cursor: usize,
    /// Highest the cursor has been
    peak: usize,
}

impl StackAllocator {
    /// Create a stack allocator over `capacity` bytes
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_config(RegionConfig::new(capacity))
    }

    /// Create a stack allocator over a region reserved with `config`
    pub fn with_config(config: RegionConfig) -> Result<Self> {
        let region = Region::reserve(&config)?;

        tracing::debug!(capacity = config.size, "created stack allocator");

        Ok(Self {
            region,
            cursor: 0,
            peak: 0,
        })
    }

    /// Allocate `size` bytes aligned to `alignment` (a power of two)
    ///
    /// Returns `None` without moving the cursor when the request does not fit.
    /// A zero-size request returns an aligned pointer and leaves the cursor
    /// where it is.
    pub fn allocate(&mut self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        contract!(
            alignment.is_power_of_two(),
            "alignment {} is not a power of 2",
            alignment
        );
        if !alignment.is_power_of_two() {
            return None;
        }

        let start = self.region.start_addr();
        let aligned = align_up(start + self.cursor, alignment)? - start;
        let end = aligned.checked_add(size)?;

        if end > self.capacity() {
            tracing::trace!(
                size,
                alignment,
                available = self.available(),
                "stack allocator exhausted"
            );
            return None;
        }

        if size > 0 {
            self.cursor = end;
            self.peak = self.peak.max(end);
        }

        Some(self.region.ptr_at(aligned))
    }

    /// Current cursor position, for a later [`reset_to`](Self::reset_to)
    pub fn get_marker(&self) -> StackMarker {
        StackMarker {
            offset: self.cursor,
            origin: self.region.start_addr(),
        }
    }

    /// Rewind to the start of the region
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Rewind to a marker taken from this allocator
    ///
    /// The marker must not lie ahead of the current cursor.
    pub fn reset_to(&mut self, marker: StackMarker) {
        contract!(
            marker.origin == self.region.start_addr(),
            "marker belongs to a different stack allocator"
        );
        contract!(
            marker.offset <= self.cursor,
            "marker at {} is ahead of the cursor at {}",
            marker.offset,
            self.cursor
        );
        self.cursor = marker.offset.min(self.capacity());
    }

    /// Open a scope that rewinds to the current position when dropped
    pub fn scope(&mut self) -> StackScope<'_> {
        let marker = self.get_marker();
        StackScope {
            stack: self,
            marker,
        }
    }

    /// Get total capacity in bytes
    pub fn capacity(&self) -> usize {
        self.region.size()
    }

    /// Get currently used bytes, including alignment padding
    pub fn used(&self) -> usize {
        self.cursor
    }

    /// Get available bytes remaining
    pub fn available(&self) -> usize {
        self.capacity() - self.cursor
    }

    /// Highest number of bytes ever in use at once
    pub fn high_water_mark(&self) -> usize {
        self.peak
    }
}

impl Allocator for StackAllocator {
    fn total_size(&self) -> usize {
        self.capacity()
    }

    fn used_size(&self) -> usize {
        self.used()
    }

    fn owns(&self, ptr: NonNull<u8>) -> bool {
        self.region.contains(ptr.as_ptr())
    }

    fn capabilities(&self) -> AllocatorCapabilities {
        AllocatorCapabilities {
            individual_release: false,
            rewind: true,
            thread_safe: false,
            variable_size: true,
        }
    }
}

/// Scoped access to a [`StackAllocator`]
///
/// Everything allocated through the scope is reclaimed when it drops.
#[derive(Debug)]
pub struct StackScope<'a> {
    stack: &'a mut StackAllocator,
    marker: StackMarker,
}

impl StackScope<'_> {
    /// Position the scope rewinds to
    pub fn marker(&self) -> StackMarker {
        self.marker
    }
}

impl Deref for StackScope<'_> {
    type Target = StackAllocator;

    fn deref(&self) -> &Self::Target {
        self.stack
    }
}

impl DerefMut for StackScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.stack
    }
}

impl Drop for StackScope<'_> {
    fn drop(&mut self) {
        // A full reset inside the scope already rewound past the marker
        if self.marker.offset <= self.stack.cursor {
            self.stack.cursor = self.marker.offset;
        }
    }
}
