//! Benchmarks for the concurrency primitives.
//!
//! Benchmarks cover:
//! - BoundedQueue single-thread throughput and producer/consumer hand-off
//! - WorkerPool submit-and-wait round trips
//! - PhaseBarrier phase turnover
//! - ReadersWriterLock uncontended acquisition
//! - StagePipeline end-to-end throughput

#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use prometheus_concurrency::config::WorkerPoolConfig;
use prometheus_concurrency::core::{
    stages, BoundedQueue, NullSink, PhaseBarrier, ReadersWriterLock, StagePipeline, WorkerPool,
};

// ============================================================================
// Queue Benchmarks
// ============================================================================

fn bench_queue_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_push_pop");

    for size in [100_u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let q = BoundedQueue::new(size as usize);
                for i in 0..size {
                    q.push(i).unwrap();
                }
                while let Some(item) = q.try_pop() {
                    black_box(item);
                }
            });
        });
    }
    group.finish();
}

fn bench_queue_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_handoff");
    const ITEMS: u64 = 10_000;

    for capacity in [1_usize, 16, 256] {
        group.throughput(Throughput::Elements(ITEMS));
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            b.iter(|| {
                let q = BoundedQueue::new(capacity);
                let producer = {
                    let q = q.clone();
                    thread::spawn(move || {
                        for i in 0..ITEMS {
                            q.push(i).unwrap();
                        }
                        q.close();
                    })
                };
                let mut sum = 0_u64;
                while let Some(item) = q.pop() {
                    sum += item;
                }
                producer.join().unwrap();
                black_box(sum);
            });
        });
    }
    group.finish();
}

// ============================================================================
// Worker Pool Benchmarks
// ============================================================================

fn bench_pool_submit_wait(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_submit_wait");
    const TASKS: u64 = 1_000;

    for workers in [1_usize, 4] {
        let pool = WorkerPool::with_sink(
            WorkerPoolConfig::new().with_worker_count(workers),
            Arc::new(NullSink),
        )
        .unwrap();
        group.throughput(Throughput::Elements(TASKS));
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, _| {
            b.iter(|| {
                let futures: Vec<_> = (0..TASKS)
                    .map(|i| pool.submit(move || i.wrapping_mul(i)).unwrap())
                    .collect();
                for future in futures {
                    black_box(future.wait().unwrap());
                }
            });
        });
        pool.shutdown(true);
    }
    group.finish();
}

// ============================================================================
// Barrier and Lock Benchmarks
// ============================================================================

fn bench_barrier_phases(c: &mut Criterion) {
    const THREADS: usize = 4;
    const PHASES: u64 = 1_000;

    let mut group = c.benchmark_group("barrier");
    group.throughput(Throughput::Elements(PHASES));
    group.bench_function("four_threads", |b| {
        b.iter(|| {
            let barrier = Arc::new(PhaseBarrier::new(THREADS));
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        for _ in 0..PHASES {
                            barrier.arrive_and_wait();
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
            black_box(barrier.phase());
        });
    });
    group.finish();
}

fn bench_rw_lock_uncontended(c: &mut Criterion) {
    let lock = ReadersWriterLock::new();
    let mut group = c.benchmark_group("rw_lock_uncontended");
    group.bench_function("read", |b| {
        b.iter(|| {
            let guard = lock.read();
            black_box(&guard);
        });
    });
    group.bench_function("write", |b| {
        b.iter(|| {
            let guard = lock.write();
            black_box(&guard);
        });
    });
    group.finish();
}

// ============================================================================
// Pipeline Benchmarks
// ============================================================================

fn bench_pipeline_throughput(c: &mut Criterion) {
    const ITEMS: i64 = 5_000;
    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Elements(ITEMS as u64));

    for capacity in [1_usize, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            b.iter(|| {
                let pipeline = StagePipeline::builder()
                    .map("double", capacity, stages::multiply(2))
                    .map("add_ten", capacity, stages::add(10))
                    .filter("even", capacity, stages::keep_even())
                    .sink(Arc::new(NullSink))
                    .build()
                    .unwrap();
                for x in 0..ITEMS {
                    pipeline.submit_item(x).unwrap();
                }
                pipeline.shutdown();
                black_box(pipeline.collect_outputs().len());
            });
        });
    }
    group.finish();
}

// ============================================================================
// Benchmark Groups
// ============================================================================

criterion_group!(queue_benches, bench_queue_push_pop, bench_queue_handoff);

criterion_group!(pool_benches, bench_pool_submit_wait);

criterion_group!(sync_benches, bench_barrier_phases, bench_rw_lock_uncontended);

criterion_group!(pipeline_benches, bench_pipeline_throughput);

criterion_main!(queue_benches, pool_benches, sync_benches, pipeline_benches);
