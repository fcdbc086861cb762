use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use rust_background_system::pool::Cursor;
use rust_background_system::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn summing_pool(limit: usize, block: usize, workers: usize) -> PartitionedPool<(usize, usize)> {
    let total = Arc::new(AtomicU64::new(0));
    PartitionedPool::new(
        PoolConfig::new(workers)
            .with_read(|offset, block| Ok((offset, block)))
            .with_execute(move |(offset, block), _| {
                let mut sum = 0u64;
                for i in offset..offset + block {
                    sum = sum.wrapping_add(i as u64);
                }
                total.fetch_add(black_box(sum), Ordering::Relaxed);
                Ok(())
            })
            .with_interval(move || Ok((0, limit)))
            .with_block_size(block),
    )
    .expect("Failed to create pool")
}

fn benchmark_cursor_claims(c: &mut Criterion) {
    c.bench_function("cursor_claim_10000_blocks", |b| {
        b.iter(|| {
            let cursor = Cursor::new(0, 10_000, 1);
            let mut claimed = 0usize;
            while let Some(offset) = cursor.claim() {
                claimed = claimed.wrapping_add(black_box(offset));
            }
            claimed
        });
    });
}

fn benchmark_pool_traversal(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_traversal");
    let limit = 1_000_000;
    group.throughput(Throughput::Elements(limit as u64));

    for workers in [1, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("workers", workers),
            &workers,
            |b, &workers| {
                b.iter(|| {
                    let pool = summing_pool(limit, 1000, workers);
                    pool.start().expect("Failed to run pool")
                });
            },
        );
    }

    group.finish();
}

fn benchmark_block_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_size");
    let limit = 100_000;

    for block in [1, 10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(block), &block, |b, &block| {
            b.iter(|| {
                let pool = summing_pool(limit, block, 4);
                pool.start().expect("Failed to run pool")
            });
        });
    }

    group.finish();
}

fn benchmark_uneven_blocks(c: &mut Criterion) {
    let mut group = c.benchmark_group("uneven_blocks");
    let limit = 20_000;

    for workers in [1, 4] {
        group.bench_with_input(
            BenchmarkId::new("workers", workers),
            &workers,
            |b, &workers| {
                b.iter(|| {
                    // Per-block cost varies so faster workers claim more blocks
                    let pool = PartitionedPool::new(
                        PoolConfig::new(workers)
                            .with_read(|_offset, _block| {
                                Ok(rand::thread_rng().gen_range(10..2000u64))
                            })
                            .with_execute(|spins, _| {
                                let mut acc = 0u64;
                                for i in 0..spins {
                                    acc = acc.wrapping_mul(31).wrapping_add(i);
                                }
                                black_box(acc);
                                Ok(())
                            })
                            .with_interval(move || Ok((0, limit)))
                            .with_block_size(10),
                    )
                    .expect("Failed to create pool");
                    pool.start().expect("Failed to run pool")
                });
            },
        );
    }

    group.finish();
}

fn benchmark_task_launch(c: &mut Criterion) {
    c.bench_function("task_launch_and_join_100", |b| {
        b.iter(|| {
            let task = Task::new();
            for i in 0..100u64 {
                task.go(move || {
                    black_box(i * 2);
                });
            }
            task.wait();
        });
    });
}

fn benchmark_supervisor_shutdown(c: &mut Criterion) {
    c.bench_function("supervisor_quit_32_activities", |b| {
        b.iter(|| {
            let supervisor =
                Supervisor::new(SupervisorConfig::default()).expect("Failed to create supervisor");
            for _ in 0..32 {
                supervisor
                    .register(ClosureActivity::new(|_ctx: &CancellationToken| Ok(())))
                    .expect("Failed to register activity");
            }
            supervisor.quit()
        });
    });
}

criterion_group!(
    benches,
    benchmark_cursor_claims,
    benchmark_pool_traversal,
    benchmark_block_size,
    benchmark_uneven_blocks,
    benchmark_task_launch,
    benchmark_supervisor_shutdown
);
criterion_main!(benches);
