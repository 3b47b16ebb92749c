use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rtalloc::{
    ConcurrentPoolAllocator, FreeListAllocator, FreeListStrategy, PoolAllocator, StackAllocator,
    SyncStrategy,
};
use std::{sync::Arc, thread};

const BATCH: usize = 100;

fn benchmark_system_allocator(c: &mut Criterion) {
    let mut group = c.benchmark_group("SystemAllocator");

    for size in [64, 256, 1024].iter() {
        group.bench_with_input(BenchmarkId::new("box_alloc_free", size), size, |b, &size| {
            b.iter(|| {
                let boxes: Vec<Box<[u8]>> = (0..BATCH)
                    .map(|_| vec![0u8; size].into_boxed_slice())
                    .collect();
                black_box(boxes);
            });
        });
    }

    group.finish();
}

fn benchmark_pool_allocator(c: &mut Criterion) {
    let mut group = c.benchmark_group("PoolAllocator");

    for block_size in [64, 256, 1024].iter() {
        group.bench_with_input(
            BenchmarkId::new("allocate_release", block_size),
            block_size,
            |b, &block_size| {
                let mut pool = PoolAllocator::new(block_size, BATCH).unwrap();
                let mut ptrs = Vec::with_capacity(BATCH);

                b.iter(|| {
                    while let Some(ptr) = pool.allocate() {
                        ptrs.push(ptr);
                    }
                    for ptr in ptrs.drain(..) {
                        unsafe { pool.release(ptr.as_ptr()) };
                    }
                });
            },
        );
    }

    group.finish();
}

fn benchmark_concurrent_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("ConcurrentPoolAllocator");

    for strategy in [SyncStrategy::LockFree, SyncStrategy::Mutex] {
        group.bench_function(BenchmarkId::new("single_thread", format!("{:?}", strategy)), |b| {
            let pool = ConcurrentPoolAllocator::with_strategy(64, BATCH, strategy).unwrap();
            let mut ptrs = Vec::with_capacity(BATCH);

            b.iter(|| {
                while let Some(ptr) = pool.allocate() {
                    ptrs.push(ptr);
                }
                for ptr in ptrs.drain(..) {
                    unsafe { pool.release(ptr.as_ptr()) };
                }
            });
        });

        group.bench_function(BenchmarkId::new("four_threads", format!("{:?}", strategy)), |b| {
            let pool = Arc::new(ConcurrentPoolAllocator::with_strategy(64, 256, strategy).unwrap());

            b.iter(|| {
                thread::scope(|s| {
                    for _ in 0..4 {
                        let pool = &pool;
                        s.spawn(move || {
                            for _ in 0..BATCH {
                                if let Some(ptr) = pool.allocate() {
                                    unsafe { pool.release(ptr.as_ptr()) };
                                }
                            }
                        });
                    }
                });
            });
        });
    }

    group.finish();
}

fn benchmark_stack_allocator(c: &mut Criterion) {
    let mut group = c.benchmark_group("StackAllocator");

    for size in [64, 256, 1024].iter() {
        group.bench_with_input(BenchmarkId::new("allocate_reset", size), size, |b, &size| {
            let mut stack = StackAllocator::new(1024 * 1024).unwrap();

            b.iter(|| {
                for _ in 0..BATCH {
                    black_box(stack.allocate(size, 16));
                }
                stack.reset();
            });
        });
    }

    group.finish();
}

fn benchmark_free_list_allocator(c: &mut Criterion) {
    let mut group = c.benchmark_group("FreeListAllocator");

    for strategy in [FreeListStrategy::FirstFit, FreeListStrategy::BestFit] {
        group.bench_function(BenchmarkId::new("mixed_sizes", format!("{:?}", strategy)), |b| {
            let mut heap = FreeListAllocator::new(1024 * 1024, strategy).unwrap();
            let mut ptrs = Vec::with_capacity(BATCH);

            b.iter(|| {
                for i in 0..BATCH {
                    if let Some(ptr) = heap.allocate(32 + (i % 8) * 96, 16) {
                        ptrs.push(ptr);
                    }
                }
                // Free alternate blocks first to exercise coalescing
                for ptr in ptrs.iter().step_by(2) {
                    unsafe { heap.release(ptr.as_ptr()) };
                }
                for ptr in ptrs.drain(..).skip(1).step_by(2) {
                    unsafe { heap.release(ptr.as_ptr()) };
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_system_allocator,
    benchmark_pool_allocator,
    benchmark_concurrent_pool,
    benchmark_stack_allocator,
    benchmark_free_list_allocator
);
criterion_main!(benches);
