//! Partitioned pool example
//!
//! Demonstrates N workers cooperatively traversing an index range in blocks,
//! then prints the per-worker report.
//!
//! Run with: cargo run --example partitioned_pool

use rust_background_system::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== Rust Background System - Partitioned Pool Example ===\n");

    // Sum of squares over [1, 200) split into blocks of 10
    let total = Arc::new(AtomicU64::new(0));
    let sum = Arc::clone(&total);

    let pool = PartitionedPool::new(
        PoolConfig::new(5)
            .with_name("squares")
            .with_block_size(10)
            .with_interval(|| Ok((1, 200)))
            .with_read(|offset, block| {
                // Pretend to load a page of records
                thread::sleep(Duration::from_millis(5));
                Ok((offset..offset + block).map(|i| i as u64).collect::<Vec<_>>())
            })
            .with_execute(move |values, _block| {
                let squares: u64 = values.iter().filter(|v| **v < 200).map(|v| v * v).sum();
                sum.fetch_add(squares, Ordering::Relaxed);
                Ok(())
            }),
    )?;

    let (start, limit) = pool.interval();
    println!(
        "1. Traversing [{}, {}) with {} workers, block size {}",
        start,
        limit,
        pool.workers(),
        pool.block_size()
    );

    let report = pool.start()?;

    println!("\n2. Result: sum of squares = {}", total.load(Ordering::Relaxed));
    println!(
        "\n3. {} blocks executed in {:?}",
        report.blocks_executed(),
        report.elapsed
    );
    for worker in &report.workers {
        println!(
            "   Worker #{}: {} claimed, {} executed, busy {} us",
            worker.worker_id, worker.blocks_claimed, worker.blocks_executed, worker.busy_time_us
        );
    }

    println!("\n4. JSON report:\n{}", report.to_json()?);

    Ok(())
}
