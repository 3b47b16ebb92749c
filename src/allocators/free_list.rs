//! Free-list allocator implementation - variable-size blocks with coalescing
//!
//! Free space is a singly linked list of blocks sorted by address. Each free
//! block starts with a [`FreeBlock`] node; each allocation is preceded by an
//! [`AllocationHeader`] so release can recover the block from the user
//! pointer alone. All links are byte offsets from the region start.

use std::{mem, ptr::NonNull};

use super::{
    align_up,
    traits::{Allocator, AllocatorCapabilities},
};
use crate::{
    config::WORD_SIZE,
    error::{AllocError, Result},
    memory::{Region, RegionConfig},
    validate::contract,
};

/// Offset terminating the free list
const NIL: usize = usize::MAX;

/// Node stored at the start of every free block
#[derive(Debug, Clone, Copy)]
#[repr(C)]
struct FreeBlock {
    size: usize,
    next: usize,
}

/// Record stored immediately before every returned pointer
#[derive(Debug, Clone, Copy)]
#[repr(C)]
struct AllocationHeader {
    /// Bytes consumed: header, padding and payload
    size: usize,
    /// Distance from the block start to the returned pointer
    adjustment: usize,
}

const FREE_BLOCK_SIZE: usize = mem::size_of::<FreeBlock>();
const HEADER_SIZE: usize = mem::size_of::<AllocationHeader>();

/// How the free list picks a block for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FreeListStrategy {
    /// Take the first block that fits
    #[default]
    FirstFit,
    /// Scan every block and take the smallest that fits
    BestFit,
}

/// A block chosen for an allocation
#[derive(Debug, Clone, Copy)]
struct Fit {
    /// Free block preceding the chosen one, or NIL
    prev: usize,
    offset: usize,
    block: FreeBlock,
    adjustment: usize,
    /// Bytes the request needs from the block
    needed: usize,
}

/// General-purpose allocator for variable-size blocks
///
/// Supports individual release in any order; adjacent free blocks are merged
/// on release. Allocation and release are O(n) in the number of free blocks.
#[derive(Debug)]
pub struct FreeListAllocator {
    /// Backing memory
    region: Region,
    strategy: FreeListStrategy,
    /// Offset of the lowest free block
    head: usize,
    /// Bytes consumed by live allocations, headers included
    used: usize,
    allocations: usize,
}

impl FreeListAllocator {
    /// Create a free-list allocator over `capacity` bytes
    pub fn new(capacity: usize, strategy: FreeListStrategy) -> Result<Self> {
        Self::with_config(RegionConfig::new(capacity), strategy)
    }

    /// Create a free-list allocator over a region reserved with `config`
    pub fn with_config(config: RegionConfig, strategy: FreeListStrategy) -> Result<Self> {
        if config.size <= FREE_BLOCK_SIZE {
            return Err(AllocError::invalid_parameter(
                "capacity",
                format!("Capacity must be larger than {} bytes", FREE_BLOCK_SIZE),
            ));
        }

        let region = Region::reserve(&config)?;
        let mut allocator = Self {
            region,
            strategy,
            head: 0,
            used: 0,
            allocations: 0,
        };

        // SAFETY: offset 0 is word aligned and the region holds a FreeBlock
        unsafe {
            allocator.write_block(
                0,
                FreeBlock {
                    size: config.size,
                    next: NIL,
                },
            )
        };

        tracing::debug!(capacity = config.size, ?strategy, "created free-list allocator");

        Ok(allocator)
    }

    /// Allocate `size` bytes aligned to `alignment` (a power of two)
    ///
    /// Returns `None`, leaving the allocator untouched, when no free block
    /// can hold the header, padding and payload.
    pub fn allocate(&mut self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        contract!(
            alignment.is_power_of_two(),
            "alignment {} is not a power of 2",
            alignment
        );
        if !alignment.is_power_of_two() {
            return None;
        }
        // The header right before the payload must itself be aligned
        let alignment = alignment.max(mem::align_of::<AllocationHeader>());

        let Some(fit) = self.find_fit(size, alignment) else {
            tracing::trace!(
                size,
                alignment,
                available = self.available(),
                free_blocks = self.free_block_count(),
                "free-list allocator has no fitting block"
            );
            return None;
        };

        let remainder = fit.block.size - fit.needed;
        let (consumed, replacement) = if remainder > FREE_BLOCK_SIZE {
            let split = fit.offset + fit.needed;
            // SAFETY: split is word aligned and remainder holds a FreeBlock
            unsafe {
                self.write_block(
                    split,
                    FreeBlock {
                        size: remainder,
                        next: fit.block.next,
                    },
                )
            };
            (fit.needed, split)
        } else {
            // Too small to stand alone; the allocation absorbs it
            (fit.block.size, fit.block.next)
        };
        self.set_next(fit.prev, replacement);

        let user = fit.offset + fit.adjustment;
        // SAFETY: adjustment >= HEADER_SIZE and user is header aligned
        unsafe {
            self.write_header(
                user - HEADER_SIZE,
                AllocationHeader {
                    size: consumed,
                    adjustment: fit.adjustment,
                },
            )
        };

        self.used += consumed;
        self.allocations += 1;

        Some(self.region.ptr_at(user))
    }

    /// Return an allocation, merging it with adjacent free blocks.
    /// A null pointer is ignored.
    ///
    /// # Safety
    /// `ptr` must be null or a pointer returned by
    /// [`allocate`](Self::allocate) on this allocator that has not been
    /// released since, and the header before it must not have been written to.
    pub unsafe fn release(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }

        contract!(
            self.allocations > 0,
            "release on a free-list allocator with no live allocations"
        );

        let user = (ptr as usize).wrapping_sub(self.region.start_addr());
        contract!(
            user >= HEADER_SIZE && user <= self.capacity(),
            "pointer {:p} does not belong to this allocator",
            ptr
        );

        let header = self.read_header(user - HEADER_SIZE);
        contract!(
            header.adjustment >= HEADER_SIZE
                && header.adjustment <= user
                && header.size >= header.adjustment
                && user - header.adjustment + header.size <= self.capacity(),
            "corrupted allocation header before {:p}",
            ptr
        );

        let start = user - header.adjustment;
        let size = header.size;

        // Find the neighbours that keep the list sorted by address
        let mut prev = NIL;
        let mut next = self.head;
        while next != NIL && next < start {
            prev = next;
            next = self.read_block(next).next;
        }

        contract!(
            prev == NIL || prev + self.read_block(prev).size <= start,
            "block at offset {} overlaps free space (double release?)",
            start
        );
        contract!(
            next == NIL || start + size <= next,
            "block at offset {} overlaps free space (double release?)",
            start
        );

        self.write_block(start, FreeBlock { size, next });
        self.set_next(prev, start);
        self.coalesce(prev, start);

        self.used -= size;
        self.allocations -= 1;
    }

    /// Pick a block for `size` bytes at `alignment` according to the strategy
    fn find_fit(&self, size: usize, alignment: usize) -> Option<Fit> {
        let mut best: Option<Fit> = None;
        let mut prev = NIL;
        let mut offset = self.head;

        while offset != NIL {
            // SAFETY: list entries are free block offsets
            let block = unsafe { self.read_block(offset) };

            if let Some((adjustment, needed)) = self.fit_in(offset, block.size, size, alignment) {
                let candidate = Fit {
                    prev,
                    offset,
                    block,
                    adjustment,
                    needed,
                };
                match self.strategy {
                    FreeListStrategy::FirstFit => return Some(candidate),
                    FreeListStrategy::BestFit => {
                        if best.map_or(true, |b| block.size < b.block.size) {
                            best = Some(candidate);
                        }
                    }
                }
            }

            prev = offset;
            offset = block.next;
        }

        best
    }

    /// Header adjustment and total bytes needed to place the request in the
    /// block at `offset`, if it fits
    fn fit_in(
        &self,
        offset: usize,
        block_size: usize,
        size: usize,
        alignment: usize,
    ) -> Option<(usize, usize)> {
        let addr = self.region.start_addr() + offset;
        let aligned = align_up(addr.checked_add(HEADER_SIZE)?, alignment)?;
        let adjustment = aligned - addr;
        // Word granularity keeps every split block word aligned
        let needed = align_up(adjustment.checked_add(size)?, WORD_SIZE)?;

        (needed <= block_size).then_some((adjustment, needed))
    }

    /// Merge the free block at `offset` with its successor and predecessor
    /// when they touch
    fn coalesce(&mut self, prev: usize, offset: usize) {
        // SAFETY: prev and offset are linked free block offsets
        unsafe {
            let mut block = self.read_block(offset);
            if block.next != NIL && offset + block.size == block.next {
                let next = self.read_block(block.next);
                block.size += next.size;
                block.next = next.next;
                self.write_block(offset, block);
            }

            if prev != NIL {
                let mut before = self.read_block(prev);
                if prev + before.size == offset {
                    before.size += block.size;
                    before.next = block.next;
                    self.write_block(prev, before);
                }
            }
        }
    }

    /// Point `prev` (or the list head) at `next`
    fn set_next(&mut self, prev: usize, next: usize) {
        if prev == NIL {
            self.head = next;
        } else {
            // SAFETY: prev is a linked free block offset
            unsafe {
                let mut block = self.read_block(prev);
                block.next = next;
                self.write_block(prev, block);
            }
        }
    }

    /// # Safety
    /// `offset` is word aligned and a FreeBlock fits at it inside the region
    unsafe fn read_block(&self, offset: usize) -> FreeBlock {
        self.region.as_ptr().add(offset).cast::<FreeBlock>().read()
    }

    /// # Safety
    /// `offset` is word aligned and a FreeBlock fits at it inside the region
    unsafe fn write_block(&mut self, offset: usize, block: FreeBlock) {
        self.region.as_ptr().add(offset).cast::<FreeBlock>().write(block);
    }

    /// # Safety
    /// `offset` is word aligned and a header fits at it inside the region
    unsafe fn read_header(&self, offset: usize) -> AllocationHeader {
        self.region
            .as_ptr()
            .add(offset)
            .cast::<AllocationHeader>()
            .read()
    }

    /// # Safety
    /// `offset` is word aligned and a header fits at it inside the region
    unsafe fn write_header(&mut self, offset: usize, header: AllocationHeader) {
        self.region
            .as_ptr()
            .add(offset)
            .cast::<AllocationHeader>()
            .write(header);
    }

    /// `(offset, size)` of every free block in address order
    fn free_blocks(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let mut offset = self.head;
        std::iter::from_fn(move || {
            if offset == NIL {
                return None;
            }
            // SAFETY: list entries are free block offsets
            let block = unsafe { self.read_block(offset) };
            let item = (offset, block.size);
            offset = block.next;
            Some(item)
        })
    }

    /// Get total capacity in bytes
    pub fn capacity(&self) -> usize {
        self.region.size()
    }

    /// Get currently used bytes (including headers and padding)
    pub fn used(&self) -> usize {
        self.used
    }

    /// Get available bytes remaining
    pub fn available(&self) -> usize {
        self.capacity() - self.used
    }

    /// Get number of live allocations
    pub fn allocation_count(&self) -> usize {
        self.allocations
    }

    /// Block selection strategy
    pub fn strategy(&self) -> FreeListStrategy {
        self.strategy
    }

    /// Number of free blocks in the list
    pub fn free_block_count(&self) -> usize {
        self.free_blocks().count()
    }

    /// Size of the largest free block
    pub fn largest_free_block(&self) -> usize {
        self.free_blocks().map(|(_, size)| size).max().unwrap_or(0)
    }

    /// Share of free space outside the largest free block (0.0 to 1.0)
    pub fn fragmentation(&self) -> f64 {
        let available = self.available();
        if available == 0 {
            return 0.0;
        }
        1.0 - self.largest_free_block() as f64 / available as f64
    }
}

impl Allocator for FreeListAllocator {
    fn total_size(&self) -> usize {
        self.capacity()
    }

    fn used_size(&self) -> usize {
        self.used
    }

    fn owns(&self, ptr: NonNull<u8>) -> bool {
        self.region.contains(ptr.as_ptr())
    }

    fn capabilities(&self) -> AllocatorCapabilities {
        AllocatorCapabilities {
            variable_size: true,
            ..Default::default()
        }
    }
}

impl Drop for FreeListAllocator {
    fn drop(&mut self) {
        if self.allocations > 0 {
            tracing::warn!(
                live = self.allocations,
                used = self.used,
                "free-list allocator dropped with live allocations"
            );
        }
    }
}
