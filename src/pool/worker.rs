//! Worker loop of a partitioned pool

use crate::core::{CallbackStage, Result, ThreadError};
use crate::pool::config::{ExecuteFn, ReadFn};
use crate::pool::cursor::{Cursor, StopSignal};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

#[cfg(feature = "tracing")]
use tracing::{debug, span, Level};

/// Statistics for a worker thread
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Blocks claimed from the cursor
    pub blocks_claimed: AtomicU64,
    /// Blocks whose read and execute both succeeded
    pub blocks_executed: AtomicU64,
    /// Total time spent inside callbacks (microseconds)
    pub busy_time_us: AtomicU64,
    /// Set when a callback error ended the worker
    pub failed: AtomicBool,
    /// Set when a callback panicked
    pub panicked: AtomicBool,
}

impl WorkerStats {
    /// Create new worker statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment blocks claimed counter
    pub fn increment_claimed(&self) {
        self.blocks_claimed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment blocks executed counter
    pub fn increment_executed(&self) {
        self.blocks_executed.fetch_add(1, Ordering::Relaxed);
    }

    /// Add time spent in callbacks
    pub fn add_busy_time(&self, microseconds: u64) {
        self.busy_time_us.fetch_add(microseconds, Ordering::Relaxed);
    }

    /// Mark the worker as stopped by a callback error
    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::Relaxed);
    }

    /// Mark the worker as stopped by a panic
    pub fn mark_panicked(&self) {
        self.panicked.store(true, Ordering::Relaxed);
    }

    /// Get total blocks claimed
    pub fn get_blocks_claimed(&self) -> u64 {
        self.blocks_claimed.load(Ordering::Relaxed)
    }

    /// Get total blocks executed
    pub fn get_blocks_executed(&self) -> u64 {
        self.blocks_executed.load(Ordering::Relaxed)
    }

    /// Whether the worker ended on a callback error
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    /// Whether the worker ended on a panic
    pub fn has_panicked(&self) -> bool {
        self.panicked.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self, worker_id: usize) -> WorkerStatSnapshot {
        WorkerStatSnapshot {
            worker_id,
            blocks_claimed: self.get_blocks_claimed(),
            blocks_executed: self.get_blocks_executed(),
            busy_time_us: self.busy_time_us.load(Ordering::Relaxed),
            failed: self.has_failed(),
            panicked: self.has_panicked(),
        }
    }
}

/// Serializable copy of [`WorkerStats`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStatSnapshot {
    /// Worker index within the pool
    pub worker_id: usize,
    /// Blocks claimed from the cursor
    pub blocks_claimed: u64,
    /// Blocks fully processed
    pub blocks_executed: u64,
    /// Time spent inside callbacks (microseconds)
    pub busy_time_us: u64,
    /// Ended on a callback error
    pub failed: bool,
    /// Ended on a panic
    pub panicked: bool,
}

/// Everything a worker borrows from its pool
pub(crate) struct WorkerContext<'a, D> {
    pub(crate) pool_name: &'a str,
    pub(crate) cursor: &'a Cursor,
    pub(crate) signal: &'a StopSignal,
    pub(crate) read: &'a ReadFn<D>,
    pub(crate) execute: &'a ExecuteFn<D>,
    pub(crate) block_size: usize,
}

/// Main worker loop
///
/// Stops when the signal is closed, the cursor is exhausted or a callback
/// fails. Cancellation is checked before every claim and never interrupts a
/// block that is already being processed. A callback failure is logged here
/// and returned so the barrier can count it; siblings keep running.
pub(crate) fn run<D>(id: usize, ctx: &WorkerContext<'_, D>, stats: &WorkerStats) -> Result<()> {
    #[cfg(feature = "tracing")]
    let worker_span = span!(Level::DEBUG, "pool_worker", pool = ctx.pool_name, id = id);
    #[cfg(feature = "tracing")]
    let _guard = worker_span.enter();

    log::debug!("Pool '{}': worker #{} running", ctx.pool_name, id);

    let outcome = work(id, ctx, stats);
    if let Err(e) = &outcome {
        stats.mark_failed();
        log::error!("Pool '{}': {}", ctx.pool_name, e);
    }

    #[cfg(feature = "tracing")]
    debug!(
        blocks_claimed = stats.get_blocks_claimed(),
        blocks_executed = stats.get_blocks_executed(),
        "worker closed"
    );
    log::debug!(
        "Pool '{}': worker #{} closed after {} blocks",
        ctx.pool_name,
        id,
        stats.get_blocks_executed()
    );

    outcome
}

fn work<D>(id: usize, ctx: &WorkerContext<'_, D>, stats: &WorkerStats) -> Result<()> {
    while !ctx.signal.is_closed() {
        let Some(offset) = ctx.cursor.claim() else {
            break;
        };
        stats.increment_claimed();

        let start = Instant::now();
        let result = process_block(id, offset, ctx);
        let elapsed = start.elapsed();
        stats.add_busy_time(elapsed.as_micros() as u64);

        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_block(offset, elapsed, result.is_ok());

        result?;
        stats.increment_executed();
    }
    Ok(())
}

fn process_block<D>(id: usize, offset: usize, ctx: &WorkerContext<'_, D>) -> Result<()> {
    let data = (ctx.read)(offset, ctx.block_size)
        .map_err(|e| ThreadError::callback(id, offset, CallbackStage::Read, e))?;
    (ctx.execute)(data, ctx.block_size)
        .map_err(|e| ThreadError::callback(id, offset, CallbackStage::Execute, e))
}
