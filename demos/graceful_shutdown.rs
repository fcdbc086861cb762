//! Graceful shutdown example
//!
//! Runs an effectively endless partitioned traversal plus a periodic job, and
//! shuts both down on Ctrl-C (or after a few seconds when nobody presses it).
//!
//! Run with: cargo run --example graceful_shutdown

use rust_background_system::prelude::*;
use rust_background_system::signal::install_termination_handler;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== Rust Background System - Graceful Shutdown Example ===\n");

    let source = CancellationToken::new();
    install_termination_handler(source.clone())?;

    let supervisor = Supervisor::listen(
        SupervisorConfig::new()
            .with_name("demo")
            .with_shutdown_timeout(Duration::from_secs(5)),
        &source,
    )?;

    let processed = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&processed);
    let pool = Arc::new(PartitionedPool::new(
        PoolConfig::new(4)
            .with_name("indexer")
            .with_block_size(100)
            .with_interval(|| Ok((0, usize::MAX)))
            .with_read(|offset, block| Ok((offset, block)))
            .with_execute(move |(_offset, block), _| {
                thread::sleep(Duration::from_millis(20));
                counter.fetch_add(block as u64, Ordering::Relaxed);
                Ok(())
            }),
    )?);

    let runner = Arc::new(Task::new().with_name("runner"));
    let heartbeat =
        Arc::new(Task::with_join_policy(JoinPolicy::HonorContext).with_name("heartbeat"));

    // The pool must be stopped before the task that drives it is joined
    supervisor.register(Arc::clone(&pool))?;
    supervisor.register(Arc::clone(&runner))?;
    supervisor.register(Arc::clone(&heartbeat))?;

    let driven = Arc::clone(&pool);
    runner.go(move || match driven.start() {
        Ok(report) => println!(
            "Pool '{}' stopped after {} blocks",
            report.name,
            report.blocks_executed()
        ),
        Err(e) => eprintln!("Pool failed: {}", e),
    });

    let watched = Arc::clone(&processed);
    let stop = pool.stop_token();
    heartbeat.go(move || {
        while !stop.wait_timeout(Duration::from_millis(500)) {
            println!("  ... {} indices processed", watched.load(Ordering::Relaxed));
        }
    });

    println!("Press Ctrl-C to stop (auto-stop in 3s)\n");
    if !source.wait_timeout(Duration::from_secs(3)) {
        source.cancel();
    }

    while supervisor.state() != SupervisorState::Quiesced {
        thread::sleep(Duration::from_millis(10));
    }

    println!(
        "\nShutdown complete: {} indices processed",
        processed.load(Ordering::Relaxed)
    );
    Ok(())
}
