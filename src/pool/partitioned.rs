//! Partitioned work-pool implementation

use crate::core::error::panic_message;
use crate::core::{Activity, CancellationToken, Result, ThreadError};
use crate::pool::config::{ExecuteFn, PoolConfig, ReadFn};
use crate::pool::cursor::{Cursor, StopSignal};
use crate::pool::worker::{self, WorkerContext, WorkerStatSnapshot, WorkerStats};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Summary of one traversal, returned by [`PartitionedPool::start`]
#[derive(Debug, Clone, Serialize)]
pub struct PoolReport {
    /// Pool name
    pub name: String,
    /// First index of the interval
    pub start: usize,
    /// Exclusive upper bound of the interval
    pub limit: usize,
    /// Block width
    pub block_size: usize,
    /// Per-worker statistics
    pub workers: Vec<WorkerStatSnapshot>,
    /// Whether the stop signal was closed when the workers exited
    pub stopped: bool,
    /// Wall time of the traversal
    pub elapsed: Duration,
}

impl PoolReport {
    /// Blocks claimed across all workers
    pub fn blocks_claimed(&self) -> u64 {
        self.workers.iter().map(|w| w.blocks_claimed).sum()
    }

    /// Blocks fully processed across all workers
    pub fn blocks_executed(&self) -> u64 {
        self.workers.iter().map(|w| w.blocks_executed).sum()
    }

    /// Workers that ended on a callback error
    pub fn failed_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.failed).count()
    }

    /// Workers that ended on a panic
    pub fn panicked_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.panicked).count()
    }

    /// Render the report as JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ThreadError::other(e.to_string()))
    }
}

/// A fixed set of workers cooperatively traversing `[start, limit)` in blocks
///
/// Each worker repeatedly claims the next unclaimed block from a shared
/// cursor, reads it and executes it, until the range is exhausted or
/// [`stop`](Self::stop) is requested. A pool performs exactly one traversal.
///
/// # Example
///
/// ```rust
/// use rust_background_system::prelude::*;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// # fn main() -> Result<()> {
/// let executed = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&executed);
///
/// let pool = PartitionedPool::new(
///     PoolConfig::new(5)
///         .with_read(|offset, _block| Ok(offset))
///         .with_execute(move |_offset, _block| {
///             counter.fetch_add(1, Ordering::SeqCst);
///             Ok(())
///         })
///         .with_interval(|| Ok((1, 200)))
///         .with_block_size(10),
/// )?;
///
/// let report = pool.start()?;
/// assert_eq!(executed.load(Ordering::SeqCst), 20);
/// assert_eq!(report.blocks_executed(), 20);
/// # Ok(())
/// # }
/// ```
pub struct PartitionedPool<D> {
    name: String,
    read: ReadFn<D>,
    execute: ExecuteFn<D>,
    block_size: usize,
    workers: usize,
    cursor: Cursor,
    signal: StopSignal,
    started: AtomicBool,
    stats: Vec<Arc<WorkerStats>>,
}

impl<D> std::fmt::Debug for PartitionedPool<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionedPool")
            .field("name", &self.name)
            .field("cursor", &self.cursor)
            .field("workers", &self.workers)
            .field("stopped", &self.signal.is_closed())
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish()
    }
}

impl<D> PartitionedPool<D> {
    /// Build a pool from its configuration
    ///
    /// Calls the interval callback once to seed the cursor.
    ///
    /// # Errors
    ///
    /// - [`ThreadError::InvalidConfig`] if a callback is unset or the block size
    ///   or worker count is zero
    /// - [`ThreadError::RangeProduction`] if the interval callback fails
    pub fn new(config: PoolConfig<D>) -> Result<Self> {
        config.validate()?;

        let PoolConfig {
            read,
            execute,
            interval,
            block_size,
            workers,
            name,
        } = config;
        let (Some(read), Some(execute), Some(interval)) = (read, execute, interval) else {
            return Err(ThreadError::other("pool callbacks missing after validation"));
        };

        let (start, limit) = interval().map_err(ThreadError::range_production)?;
        log::debug!(
            "Pool '{}': interval [{}, {}) in blocks of {}",
            name,
            start,
            limit,
            block_size
        );

        Ok(Self {
            name,
            read,
            execute,
            block_size,
            workers,
            cursor: Cursor::new(start, limit, block_size),
            signal: StopSignal::new(),
            started: AtomicBool::new(false),
            stats: (0..workers).map(|_| Arc::new(WorkerStats::new())).collect(),
        })
    }

    /// Run the traversal and block until every worker has exited
    ///
    /// Spawns exactly `workers` threads named `{name}-{id}`. Callback errors
    /// end only the worker that hit them and are logged, never returned here;
    /// a panicking worker is caught at the barrier and logged the same way.
    ///
    /// # Errors
    ///
    /// - [`ThreadError::AlreadyStarted`] on a second call
    /// - [`ThreadError::SpawnError`] if a worker thread could not be spawned;
    ///   the workers already running are stopped and joined first
    pub fn start(&self) -> Result<PoolReport> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(ThreadError::already_started(&self.name));
        }

        let (start, limit) = self.cursor.interval();
        log::info!(
            "Pool '{}': running task with {} workers over [{}, {})",
            self.name,
            self.workers,
            start,
            limit
        );
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_pool_start(&self.name, self.workers, start, limit);

        let began = Instant::now();
        let ctx = WorkerContext {
            pool_name: &self.name,
            cursor: &self.cursor,
            signal: &self.signal,
            read: &self.read,
            execute: &self.execute,
            block_size: self.block_size,
        };

        let spawn_error = crossbeam::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.workers);
            let mut spawn_error = None;

            for (id, stats) in self.stats.iter().enumerate() {
                let ctx = &ctx;
                let spawned = scope
                    .builder()
                    .name(format!("{}-{}", self.name, id))
                    .spawn(move |_| worker::run(id, ctx, stats));
                match spawned {
                    Ok(handle) => handles.push((id, handle)),
                    Err(e) => {
                        self.signal.close();
                        spawn_error = Some(ThreadError::spawn_with_source(
                            id,
                            "Failed to spawn pool worker",
                            e,
                        ));
                        break;
                    }
                }
            }

            for (id, handle) in handles {
                // Callback errors were already logged by the worker itself
                if let Err(payload) = handle.join() {
                    self.stats[id].mark_panicked();
                    let err = ThreadError::worker_panic(id, panic_message(payload.as_ref()));
                    log::error!("Pool '{}': {}", self.name, err);
                }
            }

            spawn_error
        })
        .map_err(|payload| ThreadError::other(panic_message(payload.as_ref())))?;

        if let Some(err) = spawn_error {
            return Err(err);
        }

        let report = self.report(began.elapsed());
        log::info!(
            "Pool '{}': finished task ({} blocks executed, {} workers failed)",
            self.name,
            report.blocks_executed(),
            report.failed_workers() + report.panicked_workers()
        );
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_pool_finish(
            &self.name,
            report.blocks_executed(),
            report.failed_workers() + report.panicked_workers(),
        );

        Ok(report)
    }

    /// Request cooperative cancellation
    ///
    /// Closes the stop signal and returns immediately; workers finish the
    /// block they are processing and exit at their next check. Join through
    /// the blocking [`start`](Self::start) call to know they are gone. A
    /// repeated request is ignored with a warning.
    ///
    /// # Errors
    ///
    /// [`ThreadError::ContextExpired`] if `ctx` was already cancelled. The
    /// signal is closed either way.
    pub fn stop(&self, ctx: &CancellationToken) -> Result<()> {
        if self.signal.close() {
            log::info!("Pool '{}': stop requested", self.name);
        } else {
            log::warn!("Pool '{}': stop already requested, ignoring", self.name);
        }
        ctx.check()
    }

    /// The `[start, limit)` interval produced at construction
    pub fn interval(&self) -> (usize, usize) {
        self.cursor.interval()
    }

    /// Block width
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of workers
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Pool name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next unclaimed index
    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    /// Whether a stop has been requested
    pub fn is_stopped(&self) -> bool {
        self.signal.is_closed()
    }

    /// Whether [`start`](Self::start) has been called
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Token that is cancelled when the pool is asked to stop
    ///
    /// Long-running callbacks can watch it to bail out early.
    pub fn stop_token(&self) -> CancellationToken {
        self.signal.token().clone()
    }

    /// Statistics for all workers
    pub fn get_stats(&self) -> Vec<Arc<WorkerStats>> {
        self.stats.iter().map(Arc::clone).collect()
    }

    /// Current snapshot of the traversal
    pub fn report(&self, elapsed: Duration) -> PoolReport {
        let (start, limit) = self.cursor.interval();
        PoolReport {
            name: self.name.clone(),
            start,
            limit,
            block_size: self.block_size,
            workers: self
                .stats
                .iter()
                .enumerate()
                .map(|(id, stats)| stats.snapshot(id))
                .collect(),
            stopped: self.signal.is_closed(),
            elapsed,
        }
    }
}

impl<D> Activity for PartitionedPool<D> {
    fn shutdown(&self, ctx: &CancellationToken) -> Result<()> {
        self.stop(ctx)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
