//! Allocator trait definition

use std::ptr::NonNull;

/// Introspection shared by every allocator engine
///
/// Allocation itself is not part of the trait: each engine has its own
/// request shape (a pool hands out whole slots, the stack and free-list take a
/// size and alignment) and its own release discipline.
pub trait Allocator: std::fmt::Debug {
    /// Total size of the managed region in bytes
    fn total_size(&self) -> usize;

    /// Bytes currently handed out, including any per-allocation overhead
    fn used_size(&self) -> usize;

    /// Bytes not currently handed out
    fn available_size(&self) -> usize {
        self.total_size() - self.used_size()
    }

    /// Check if a pointer lies inside this allocator's region
    fn owns(&self, ptr: NonNull<u8>) -> bool;

    /// What the engine supports
    fn capabilities(&self) -> AllocatorCapabilities;

    /// Get allocator type name for debugging
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Common allocator operations
pub trait AllocatorExt: Allocator {
    /// Get utilization percentage (0.0 to 1.0)
    fn utilization(&self) -> f64 {
        if self.total_size() == 0 {
            return 0.0;
        }
        self.used_size() as f64 / self.total_size() as f64
    }

    /// Check if at least `bytes` are unused
    ///
    /// This is an upper bound: alignment padding and headers can still make a
    /// request of this size fail.
    fn can_hold(&self, bytes: usize) -> bool {
        self.available_size() >= bytes
    }
}

// Blanket implementation for all Allocators
impl<T: Allocator + ?Sized> AllocatorExt for T {}

/// Allocator capabilities flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorCapabilities {
    /// Supports releasing individual allocations
    pub individual_release: bool,
    /// Supports rewinding to a marker or the region start
    pub rewind: bool,
    /// Safe for concurrent allocate/release without external locking
    pub thread_safe: bool,
    /// Accepts variable-size requests
    pub variable_size: bool,
}

impl Default for AllocatorCapabilities {
    fn default() -> Self {
        Self {
            individual_release: true,
            rewind: false,
            thread_safe: false,
            variable_size: false,
        }
    }
}
