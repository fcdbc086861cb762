//! Property-based tests for rust_background_system using proptest

use parking_lot::Mutex;
use proptest::prelude::*;
use rust_background_system::pool::Cursor;
use rust_background_system::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn recording_pool(
    start: usize,
    limit: usize,
    block: usize,
    workers: usize,
) -> (PartitionedPool<usize>, Arc<Mutex<Vec<usize>>>) {
    let offsets = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&offsets);
    let pool = PartitionedPool::new(
        PoolConfig::new(workers)
            .with_read(|offset, _block| Ok(offset))
            .with_execute(move |offset, _block| {
                seen.lock().push(offset);
                Ok(())
            })
            .with_interval(move || Ok((start, limit)))
            .with_block_size(block),
    )
    .expect("Failed to create pool");
    (pool, offsets)
}

// ============================================================================
// Cursor Tests
// ============================================================================

proptest! {
    /// Claimed offsets step by the block size and never reach the limit
    #[test]
    fn test_cursor_claims_tile_interval(
        start in 0usize..500,
        len in 0usize..2000,
        block in 1usize..64
    ) {
        let limit = start + len;
        let cursor = Cursor::new(start, limit, block);

        let mut claimed = Vec::new();
        while let Some(offset) = cursor.claim() {
            claimed.push(offset);
        }

        let expected: Vec<usize> = (start..limit).step_by(block).collect();
        prop_assert_eq!(&claimed, &expected);
        prop_assert_eq!(claimed.len(), cursor.total_blocks());
        prop_assert!(cursor.is_exhausted());
        prop_assert!(cursor.claim().is_none());
    }

    /// Cursors near the top of the index space never wrap around
    #[test]
    fn test_cursor_saturates_near_usize_max(
        gap in 1usize..100,
        block in 1usize..1000
    ) {
        let limit = usize::MAX;
        let cursor = Cursor::new(limit - gap, limit, block);

        let mut count = 0usize;
        while let Some(offset) = cursor.claim() {
            prop_assert!(offset < limit);
            count += 1;
        }
        prop_assert_eq!(count, gap.div_ceil(block));
    }
}

// ============================================================================
// PartitionedPool Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Every block is executed exactly once, whatever the worker count
    #[test]
    fn test_pool_executes_each_block_once(
        start in 0usize..100,
        len in 0usize..500,
        block in 1usize..32,
        workers in 1usize..8
    ) {
        let limit = start + len;
        let (pool, offsets) = recording_pool(start, limit, block, workers);

        let report = pool.start().expect("Failed to run pool");

        let mut seen = offsets.lock().clone();
        seen.sort_unstable();
        let expected: Vec<usize> = (start..limit).step_by(block).collect();

        prop_assert_eq!(&seen, &expected);
        prop_assert_eq!(report.blocks_executed() as usize, len.div_ceil(block));
        prop_assert!(!report.stopped);
    }

    /// A pool stopped before it starts executes nothing
    #[test]
    fn test_pool_stopped_before_start_is_idle(
        len in 1usize..500,
        block in 1usize..32,
        workers in 1usize..8
    ) {
        let (pool, offsets) = recording_pool(0, len, block, workers);

        pool.stop(&CancellationToken::new()).expect("Failed to stop pool");
        let report = pool.start().expect("Failed to run pool");

        prop_assert!(offsets.lock().is_empty());
        prop_assert_eq!(report.blocks_claimed(), 0);
        prop_assert!(report.stopped);
    }

    /// Stopping mid-run leaves a disjoint prefix of in-range offsets
    #[test]
    fn test_pool_stop_mid_run_stays_in_range(
        stop_after in 1usize..20,
        block in 1usize..8,
        workers in 1usize..6
    ) {
        let limit = 10_000;
        let offsets = Arc::new(Mutex::new(Vec::new()));
        let executed = Arc::new(AtomicUsize::new(0));

        let pool = Arc::new(
            PartitionedPool::new(
                PoolConfig::new(workers)
                    .with_read(|offset, _block| Ok(offset))
                    .with_execute({
                        let offsets = Arc::clone(&offsets);
                        let executed = Arc::clone(&executed);
                        move |offset, _block| {
                            offsets.lock().push(offset);
                            executed.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        }
                    })
                    .with_interval(move || Ok((0, limit)))
                    .with_block_size(block),
            )
            .expect("Failed to create pool"),
        );

        let stopper = Arc::clone(&pool);
        let counter = Arc::clone(&executed);
        let watcher = std::thread::spawn(move || {
            while counter.load(Ordering::SeqCst) < stop_after && !stopper.is_stopped() {
                std::thread::yield_now();
                if stopper.position() >= limit {
                    break;
                }
            }
            let _ = stopper.stop(&CancellationToken::new());
        });

        let report = pool.start().expect("Failed to run pool");
        watcher.join().expect("watcher panicked");

        let mut seen = offsets.lock().clone();
        seen.sort_unstable();
        let len_before = seen.len();
        seen.dedup();

        prop_assert_eq!(seen.len(), len_before);
        prop_assert!(seen.iter().all(|o| *o < limit && o % block == 0));
        prop_assert_eq!(report.blocks_executed() as usize, seen.len());
    }
}

// ============================================================================
// Task Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Joining a task waits for every launched unit
    #[test]
    fn test_task_joins_all_units(units in 0usize..32) {
        let task = Task::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..units {
            let counter = Arc::clone(&counter);
            task.go(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        task.shutdown(&CancellationToken::new()).expect("Failed to join task");
        prop_assert_eq!(counter.load(Ordering::SeqCst), units);
        prop_assert_eq!(task.outstanding(), 0);
    }

    /// The supervisor stops activities in registration order
    #[test]
    fn test_supervisor_preserves_order(count in 0usize..16) {
        let supervisor = Supervisor::new(SupervisorConfig::default())
            .expect("Failed to create supervisor");
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..count {
            let order = Arc::clone(&order);
            supervisor
                .register(ClosureActivity::new(move |_ctx: &CancellationToken| {
                    order.lock().push(i);
                    Ok(())
                }))
                .expect("Failed to register activity");
        }

        let report = supervisor.quit().expect("first quit runs shutdown");
        prop_assert_eq!(report.outcomes.len(), count);
        prop_assert_eq!(order.lock().clone(), (0..count).collect::<Vec<_>>());
        prop_assert!(supervisor.quit().is_none());
    }
}
