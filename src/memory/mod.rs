//! Region reservation for allocator backing memory

pub mod config;
pub mod region;

pub use config::RegionConfig;
pub use region::Region;
