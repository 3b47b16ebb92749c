//! Tests for the shared allocator interface and region configuration

mod common;

use rtalloc::{
    config::{DEFAULT_ALIGNMENT, WORD_SIZE},
    Allocator, AllocatorExt, ConcurrentPoolAllocator, FreeListAllocator, FreeListStrategy,
    PoolAllocator, Region, RegionConfig, StackAllocator,
};

fn engines() -> Vec<Box<dyn Allocator>> {
    vec![
        Box::new(PoolAllocator::new(64, 16).unwrap()),
        Box::new(ConcurrentPoolAllocator::new(64, 16).unwrap()),
        Box::new(StackAllocator::new(1024).unwrap()),
        Box::new(FreeListAllocator::new(1024, FreeListStrategy::FirstFit).unwrap()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_engines_are_empty() {
        common::init_tracing();
        for engine in engines() {
            assert_eq!(engine.used_size(), 0, "{}", engine.type_name());
            assert_eq!(engine.available_size(), engine.total_size());
            assert_eq!(engine.utilization(), 0.0);
            assert!(engine.can_hold(engine.total_size()));
        }
    }

    #[test]
    fn test_capabilities_by_engine() {
        let caps: Vec<_> = engines().iter().map(|e| e.capabilities()).collect();

        assert!(caps[0].individual_release && !caps[0].thread_safe);
        assert!(caps[1].individual_release && caps[1].thread_safe);
        assert!(caps[2].rewind && !caps[2].individual_release);
        assert!(caps[3].individual_release && caps[3].variable_size);
    }

    #[test]
    fn test_owns_rejects_foreign_memory() {
        let local = Box::new(0u64);
        let foreign = std::ptr::NonNull::from(local.as_ref()).cast::<u8>();

        for engine in engines() {
            assert!(!engine.owns(foreign), "{}", engine.type_name());
        }
    }

    #[test]
    fn test_utilization_tracks_usage() {
        let mut pool = PoolAllocator::new(64, 4).unwrap();
        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        assert_eq!(pool.utilization(), 0.5);

        unsafe {
            pool.release(a.as_ptr());
            pool.release(b.as_ptr());
        }
        assert_eq!(pool.utilization(), 0.0);
    }

    #[test]
    fn test_region_config_builder() {
        let config = RegionConfig::new(4096).with_alignment(64).with_zeroed(true);
        assert_eq!(config.size, 4096);
        assert_eq!(config.alignment, 64);
        assert!(config.zeroed);
        assert!(config.validate().is_ok());

        let default = RegionConfig::default();
        assert_eq!(default.alignment, DEFAULT_ALIGNMENT);
        assert!(!default.zeroed);
    }

    #[test]
    fn test_region_config_rejects_bad_alignment() {
        let err = RegionConfig::new(64).with_alignment(48).validate().unwrap_err();
        assert_eq!(err.parameter(), Some("alignment"));

        let err = RegionConfig::new(64)
            .with_alignment(WORD_SIZE / 2)
            .validate()
            .unwrap_err();
        assert_eq!(err.parameter(), Some("alignment"));

        let err = RegionConfig::new(0).validate().unwrap_err();
        assert_eq!(err.parameter(), Some("size"));
    }

    #[test]
    fn test_region_reservation() {
        let region = Region::reserve(&RegionConfig::new(1000).with_alignment(128)).unwrap();
        assert_eq!(region.size(), 1000);
        assert_eq!(region.alignment(), 128);
        assert_eq!(region.start_addr() % 128, 0);
        assert_eq!(region.end_addr() - region.start_addr(), 1000);
        assert!(region.contains(region.as_ptr()));
        assert!(!region.contains(region.end_addr() as *const u8));
    }

    #[test]
    fn test_engines_honour_region_alignment() {
        let config = RegionConfig::new(2048).with_alignment(256);

        let mut stack = StackAllocator::with_config(config).unwrap();
        let ptr = stack.allocate(1, 1).unwrap();
        assert_eq!(ptr.as_ptr() as usize % 256, 0);

        let mut heap = FreeListAllocator::with_config(config, FreeListStrategy::BestFit).unwrap();
        let ptr = heap.allocate(1, 256).unwrap();
        assert_eq!(ptr.as_ptr() as usize % 256, 0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_config_serialization() {
        use rtalloc::SyncStrategy;

        let config = RegionConfig::new(8192).with_alignment(32).with_zeroed(true);
        let bytes = bincode::serialize(&config).unwrap();
        let decoded: RegionConfig = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, config);

        let bytes = bincode::serialize(&(FreeListStrategy::BestFit, SyncStrategy::Mutex)).unwrap();
        let decoded: (FreeListStrategy, SyncStrategy) = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, (FreeListStrategy::BestFit, SyncStrategy::Mutex));
    }
}
