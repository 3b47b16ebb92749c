//! Allocator engines and the traits they share

pub mod concurrent_pool;
pub mod free_list;
pub mod pool;
pub mod stack;
pub mod traits;

mod slots;

pub use concurrent_pool::{ConcurrentPoolAllocator, SyncStrategy};
pub use free_list::{FreeListAllocator, FreeListStrategy};
pub use pool::PoolAllocator;
pub use stack::{StackAllocator, StackMarker, StackScope};
pub use traits::{Allocator, AllocatorCapabilities, AllocatorExt};

/// Round `value` up to a multiple of `align` (a power of two)
pub(crate) fn align_up(value: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    Some(value.checked_add(align - 1)? & !(align - 1))
}
