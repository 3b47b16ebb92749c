//! Thread-safe pool allocator - fixed-size blocks shared across threads
//!
//! Two interchangeable strategies guard the free chain:
//!
//! - [`SyncStrategy::LockFree`]: a Treiber stack whose head is a
//!   `(slot index, generation)` pair packed into one `AtomicU64`. Every
//!   successful compare-and-swap bumps the generation, so a head that went
//!   `X -> Y -> X` between a thread's load and its CAS no longer compares
//!   equal (the ABA hazard).
//! - [`SyncStrategy::Mutex`]: the single-threaded pool algorithm under a lock.

use std::{
    fmt,
    hint,
    ptr::NonNull,
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
};

use parking_lot::Mutex;

use super::{
    slots::{SlotArray, NIL},
    traits::{Allocator, AllocatorCapabilities},
};
use crate::{
    config::DEFAULT_ALIGNMENT,
    error::{AllocError, Result},
    validate::contract,
};

/// How a [`ConcurrentPoolAllocator`] serializes access to its free chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SyncStrategy {
    /// Compare-and-swap on a generation-tagged head
    #[default]
    LockFree,
    /// Every pop and push holds a mutex
    Mutex,
}

/// Free-chain head: slot index in the low 32 bits, generation in the high 32
#[derive(Clone, Copy, PartialEq, Eq)]
struct TaggedHead(u64);

impl TaggedHead {
    const NIL_INDEX: u32 = u32::MAX;

    fn new(index: usize, tag: u32) -> Self {
        let index = if index == NIL {
            Self::NIL_INDEX
        } else {
            index as u32
        };
        Self(u64::from(tag) << 32 | u64::from(index))
    }

    fn index(self) -> usize {
        match self.0 as u32 {
            Self::NIL_INDEX => NIL,
            index => index as usize,
        }
    }

    fn tag(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// The head that replaces this one, pointing at `index`
    fn advance(self, index: usize) -> Self {
        Self::new(index, self.tag().wrapping_add(1))
    }
}

impl fmt::Debug for TaggedHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaggedHead({:?}, tag={})", self.index(), self.tag())
    }
}

#[derive(Debug)]
enum FreeChain {
    LockFree(AtomicU64),
    Locked(Mutex<usize>),
}

/// Pool allocator for fixed-size blocks, safe under concurrent use
///
/// `allocate` and `release` take `&self` and are linearizable. Counts read
/// while other threads are mutating the pool may be stale, but always lie in
/// `0..=capacity`.
///
/// Sharing is by reference (`&` or `Arc`), so the borrow checker keeps the
/// pool in place for as long as any thread can reach it.
pub struct ConcurrentPoolAllocator {
    /// Backing slots
    slots: SlotArray,
    /// Head of the free chain
    chain: FreeChain,
    /// Number of allocated blocks
    allocated: AtomicUsize,
    /// Highest value `allocated` has reached
    peak: AtomicUsize,
}

impl ConcurrentPoolAllocator {
    /// Create a lock-free pool of `block_count` blocks of `block_size` bytes
    pub fn new(block_size: usize, block_count: usize) -> Result<Self> {
        Self::with_strategy(block_size, block_count, SyncStrategy::default())
    }

    /// Create a pool using the given synchronization strategy
    pub fn with_strategy(
        block_size: usize,
        block_count: usize,
        strategy: SyncStrategy,
    ) -> Result<Self> {
        Self::with_config(block_size, block_count, DEFAULT_ALIGNMENT, strategy)
    }

    /// Create a pool with aligned blocks and the given strategy
    pub fn with_config(
        block_size: usize,
        block_count: usize,
        alignment: usize,
        strategy: SyncStrategy,
    ) -> Result<Self> {
        // u32::MAX marks an empty chain in the tagged head
        if block_count >= TaggedHead::NIL_INDEX as usize {
            return Err(AllocError::invalid_parameter(
                "block_count",
                format!("Block count must be below {}", TaggedHead::NIL_INDEX),
            ));
        }

        let slots = SlotArray::new(block_size, block_count, alignment)?;
        let chain = match strategy {
            SyncStrategy::LockFree => FreeChain::LockFree(AtomicU64::new(TaggedHead::new(0, 0).0)),
            SyncStrategy::Mutex => FreeChain::Locked(Mutex::new(0)),
        };

        tracing::debug!(
            block_size = slots.stride(),
            block_count,
            alignment,
            ?strategy,
            "created concurrent pool allocator"
        );

        Ok(Self {
            slots,
            chain,
            allocated: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    /// Allocate a single block
    ///
    /// Returns `None` when every block is in use at the linearization point.
    pub fn allocate(&self) -> Option<NonNull<u8>> {
        let index = match &self.chain {
            FreeChain::LockFree(head) => self.pop_lock_free(head),
            FreeChain::Locked(head) => {
                let mut head = head.lock();
                let index = *head;
                if index != NIL {
                    // SAFETY: chain entries are valid slot indices
                    *head = unsafe { self.slots.link(index) }.load(Ordering::Relaxed);
                }
                (index != NIL).then_some(index)
            }
        };

        let Some(index) = index else {
            tracing::trace!(capacity = self.capacity(), "concurrent pool exhausted");
            return None;
        };

        let live = self.allocated.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak.fetch_max(live, Ordering::Relaxed);
        self.slots.track_allocate(index);

        Some(self.slots.ptr(index))
    }

    /// Return a block to the pool. A null pointer is ignored.
    ///
    /// # Safety
    /// `ptr` must be null or a block returned by [`allocate`](Self::allocate)
    /// on this pool that no thread has released since. The block's contents
    /// are overwritten.
    pub unsafe fn release(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }

        let index = self.slots.index_of(ptr);
        self.slots.track_release(index);

        // Uncount before the block becomes poppable so that no observer can
        // see more than `capacity` blocks outstanding
        let previous = self.allocated.fetch_sub(1, Ordering::Relaxed);
        contract!(previous > 0, "release on a pool with no live blocks");

        match &self.chain {
            FreeChain::LockFree(head) => self.push_lock_free(head, index),
            FreeChain::Locked(head) => {
                let mut head = head.lock();
                self.slots.link(index).store(*head, Ordering::Relaxed);
                *head = index;
            }
        }
    }

    fn pop_lock_free(&self, head: &AtomicU64) -> Option<usize> {
        let mut current = TaggedHead(head.load(Ordering::Acquire));
        loop {
            match self.try_pop(head, current) {
                Ok(index) => return index,
                Err(actual) => {
                    current = actual;
                    hint::spin_loop();
                }
            }
        }
    }

    /// One pop attempt against the head snapshot `current`
    ///
    /// `Err` carries the head observed when the CAS failed.
    fn try_pop(
        &self,
        head: &AtomicU64,
        current: TaggedHead,
    ) -> std::result::Result<Option<usize>, TaggedHead> {
        let index = current.index();
        if index == NIL {
            return Ok(None);
        }

        // If another thread already popped this slot, its owner may be
        // overwriting the link; the generation then differs and the CAS fails
        // SAFETY: chain entries are valid slot indices
        let next = unsafe { self.slots.link(index) }.load(Ordering::Relaxed);

        head.compare_exchange_weak(
            current.0,
            current.advance(next).0,
            Ordering::AcqRel,
            Ordering::Acquire,
        )
        .map(|_| Some(index))
        .map_err(TaggedHead)
    }

    fn push_lock_free(&self, head: &AtomicU64, index: usize) {
        // SAFETY: index came from index_of on a block this pool handed out
        let link = unsafe { self.slots.link(index) };
        let mut current = TaggedHead(head.load(Ordering::Relaxed));
        loop {
            link.store(current.index(), Ordering::Relaxed);
            match head.compare_exchange_weak(
                current.0,
                current.advance(index).0,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => {
                    current = TaggedHead(actual);
                    hint::spin_loop();
                }
            }
        }
    }

    /// Get block size (the stride between blocks)
    pub fn block_size(&self) -> usize {
        self.slots.stride()
    }

    /// Get total number of blocks
    pub fn capacity(&self) -> usize {
        self.slots.count()
    }

    /// Get number of allocated blocks (may be stale under contention)
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Highest number of blocks that were allocated at once
    pub fn peak_allocated(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }

    /// Check if every block is in use
    pub fn is_full(&self) -> bool {
        self.allocated() >= self.capacity()
    }

    /// Synchronization strategy in use
    pub fn strategy(&self) -> SyncStrategy {
        match self.chain {
            FreeChain::LockFree(_) => SyncStrategy::LockFree,
            FreeChain::Locked(_) => SyncStrategy::Mutex,
        }
    }
}

impl fmt::Debug for ConcurrentPoolAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentPoolAllocator")
            .field("strategy", &self.strategy())
            .field("block_size", &self.block_size())
            .field("capacity", &self.capacity())
            .field("allocated", &self.allocated())
            .finish()
    }
}

impl Allocator for ConcurrentPoolAllocator {
    fn total_size(&self) -> usize {
        self.slots.region().size()
    }

    fn used_size(&self) -> usize {
        self.allocated() * self.block_size()
    }

    fn owns(&self, ptr: NonNull<u8>) -> bool {
        self.slots.is_slot(ptr.as_ptr())
    }

    fn capabilities(&self) -> AllocatorCapabilities {
        AllocatorCapabilities {
            thread_safe: true,
            ..Default::default()
        }
    }
}

impl Drop for ConcurrentPoolAllocator {
    fn drop(&mut self) {
        let live = *self.allocated.get_mut();
        if live > 0 {
            tracing::warn!(live, "concurrent pool allocator dropped with live blocks");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_free_head(pool: &ConcurrentPoolAllocator) -> &AtomicU64 {
        match &pool.chain {
            FreeChain::LockFree(head) => head,
            FreeChain::Locked(_) => panic!("expected a lock-free pool"),
        }
    }

    #[test]
    fn test_tagged_head_packing() {
        let head = TaggedHead::new(7, 41);
        assert_eq!(head.index(), 7);
        assert_eq!(head.tag(), 41);

        let empty = head.advance(NIL);
        assert_eq!(empty.index(), NIL);
        assert_eq!(empty.tag(), 42);

        let wrapped = TaggedHead::new(0, u32::MAX).advance(3);
        assert_eq!(wrapped.index(), 3);
        assert_eq!(wrapped.tag(), 0);
    }

    #[test]
    fn test_generation_advances_on_every_update() {
        let pool = ConcurrentPoolAllocator::new(64, 4).unwrap();
        let head = lock_free_head(&pool);
        let tag = |h: &AtomicU64| TaggedHead(h.load(Ordering::Relaxed)).tag();

        assert_eq!(tag(head), 0);
        let a = pool.allocate().unwrap();
        assert_eq!(tag(head), 1);
        let b = pool.allocate().unwrap();
        assert_eq!(tag(head), 2);
        unsafe {
            pool.release(b.as_ptr());
            pool.release(a.as_ptr());
        }
        assert_eq!(tag(head), 4);
    }

    #[test]
    fn test_stale_snapshot_rejected_after_aba() {
        let pool = ConcurrentPoolAllocator::new(64, 4).unwrap();
        let head = lock_free_head(&pool);

        // A reads head = X and stalls
        let stale = TaggedHead(head.load(Ordering::Acquire));

        // B pops X and Y, then pushes X back: the head index is X again
        let x = pool.allocate().unwrap();
        let y = pool.allocate().unwrap();
        unsafe { pool.release(x.as_ptr()) };

        let now = TaggedHead(head.load(Ordering::Acquire));
        assert_eq!(now.index(), stale.index());
        assert_ne!(now.tag(), stale.tag());

        // A resumes; its CAS must not install X's stale successor (Y)
        assert_eq!(pool.try_pop(head, stale), Err(now));
        assert_eq!(pool.allocated(), 1);

        // The chain is intact: X then the untouched blocks, never Y
        let mut seen = vec![pool.allocate().unwrap()];
        while let Some(ptr) = pool.allocate() {
            seen.push(ptr);
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], x);
        assert!(!seen.contains(&y));
    }

    #[test]
    fn test_mutex_strategy_basic() {
        let pool = ConcurrentPoolAllocator::with_strategy(64, 2, SyncStrategy::Mutex).unwrap();
        assert_eq!(pool.strategy(), SyncStrategy::Mutex);

        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        assert_ne!(a, b);
        assert!(pool.allocate().is_none());
        assert!(pool.is_full());

        unsafe { pool.release(a.as_ptr()) };
        assert_eq!(pool.allocate(), Some(a));
        assert_eq!(pool.peak_allocated(), 2);
    }

    #[test]
    fn test_rejects_block_count_beyond_index_range() {
        let err = ConcurrentPoolAllocator::new(64, u32::MAX as usize).unwrap_err();
        assert_eq!(err.parameter(), Some("block_count"));
    }
}
