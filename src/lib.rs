//! # rtalloc - Deterministic Special-Purpose Allocators
//!
//! rtalloc provides allocators that trade the generality of the system
//! allocator for predictable, low-overhead allocation patterns, as needed by
//! latency-sensitive loops such as real-time simulation frames.
//!
//! Each allocator owns one region reserved up front and never grows:
//!
//! - [`PoolAllocator`]: equal-size slots, O(1) allocate and release
//! - [`ConcurrentPoolAllocator`]: the same slots shared between threads,
//!   lock-free (generation-tagged CAS) or mutex-guarded
//! - [`StackAllocator`]: bump allocation with marker-based LIFO rewind
//! - [`FreeListAllocator`]: variable-size blocks, first-fit or best-fit,
//!   splitting on allocate and coalescing on release
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │   Pool │ Concurrent Pool │ Stack │ Free List    │
//! ├─────────────────────────────────────────────────┤
//! │   Allocator trait (sizes, ownership, caps)      │
//! ├─────────────────────────────────────────────────┤
//! │   Region: one aligned reservation per engine    │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! Running out of space is not an error: `allocate` returns `None`. Only
//! construction returns [`AllocError`]. Releasing foreign or already released
//! pointers is a caller bug caught by contract checks in debug builds (or
//! with the `validation` feature).
//!
//! ```
//! use rtalloc::{FreeListAllocator, FreeListStrategy};
//!
//! let mut heap = FreeListAllocator::new(4096, FreeListStrategy::BestFit)?;
//! let ptr = heap.allocate(100, 16).expect("fits");
//! assert_eq!(ptr.as_ptr() as usize % 16, 0);
//! unsafe { heap.release(ptr.as_ptr()) };
//! assert_eq!(heap.used(), 0);
//! # Ok::<(), rtalloc::AllocError>(())
//! ```

pub mod validate;

pub mod allocators;
pub mod error;
pub mod memory;

pub use allocators::{
    Allocator, AllocatorCapabilities, AllocatorExt, ConcurrentPoolAllocator, FreeListAllocator,
    FreeListStrategy, PoolAllocator, StackAllocator, StackMarker, StackScope, SyncStrategy,
};
pub use error::{AllocError, Result};
pub use memory::{Region, RegionConfig};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration constants
pub mod config {
    /// Default base alignment of reserved regions (the largest fundamental
    /// alignment on mainstream 64-bit targets)
    pub const DEFAULT_ALIGNMENT: usize = 16;

    /// Size of a machine word, the smallest pool block
    pub const WORD_SIZE: usize = std::mem::size_of::<usize>();
}
