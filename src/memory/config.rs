//! Configuration for reserved allocator regions

use crate::error::{AllocError, Result};

/// Configuration for reserving an allocator's backing region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionConfig {
    /// Total size of the region in bytes
    pub size: usize,
    /// Alignment of the region's first byte
    pub alignment: usize,
    /// Whether the region is zero-filled on reservation
    pub zeroed: bool,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            size: 0,
            alignment: crate::config::DEFAULT_ALIGNMENT,
            zeroed: false,
        }
    }
}

impl RegionConfig {
    /// Create a new region configuration
    pub fn new(size: usize) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    /// Set the base alignment
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Set whether the region is zero-filled
    pub fn with_zeroed(mut self, zeroed: bool) -> Self {
        self.zeroed = zeroed;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(AllocError::invalid_parameter(
                "size",
                "Region size must be greater than 0",
            ));
        }

        if !self.alignment.is_power_of_two() {
            return Err(AllocError::invalid_parameter(
                "alignment",
                format!("Alignment {} is not a power of 2", self.alignment),
            ));
        }

        if self.alignment < crate::config::WORD_SIZE {
            return Err(AllocError::invalid_parameter(
                "alignment",
                "Alignment must be at least the machine word size",
            ));
        }

        // Layout rejects sizes that overflow isize once rounded to the alignment
        if self.size > isize::MAX as usize - (self.alignment - 1) {
            return Err(AllocError::invalid_parameter(
                "size",
                format!("Region size {} is too large", self.size),
            ));
        }

        Ok(())
    }
}
