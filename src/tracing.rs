//! Tracing integration for observability.
//!
//! Enabled with the `tracing` feature. Workers open a `pool_worker` span and
//! the functions below emit events that metrics pipelines (for example
//! tracing-opentelemetry) can aggregate.
//!
//! # Example
//!
//! ```rust,ignore
//! use rust_background_system::prelude::*;
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env()
//!         .add_directive("rust_background_system=trace".parse().unwrap()))
//!     .init();
//!
//! let pool = PartitionedPool::new(config)?;
//! pool.start()?;
//! ```

/// Metrics recording functions for observability.
pub mod metrics {
    use std::time::Duration;

    /// Records the completion of one claimed block.
    #[inline]
    pub fn record_block(offset: usize, duration: Duration, success: bool) {
        let duration_us = duration.as_micros() as u64;
        if success {
            ::tracing::trace!(
                counter.blocks_executed = 1,
                histogram.block_duration_us = duration_us,
                offset = offset,
                "block executed"
            );
        } else {
            ::tracing::trace!(
                counter.blocks_failed = 1,
                histogram.block_duration_us = duration_us,
                offset = offset,
                "block failed"
            );
        }
    }

    /// Records pool startup.
    #[inline]
    pub fn record_pool_start(pool: &str, workers: usize, start: usize, limit: usize) {
        ::tracing::info!(
            pool = pool,
            workers = workers,
            start = start,
            limit = limit,
            "partitioned pool started"
        );
    }

    /// Records pool completion.
    #[inline]
    pub fn record_pool_finish(pool: &str, blocks_executed: u64, failed_workers: usize) {
        ::tracing::info!(
            pool = pool,
            blocks_executed = blocks_executed,
            failed_workers = failed_workers,
            "partitioned pool finished"
        );
    }

    /// Records the outcome of one activity shutdown.
    #[inline]
    pub fn record_activity_shutdown(activity: &str, duration: Duration, success: bool) {
        ::tracing::debug!(
            activity = activity,
            duration_ms = duration.as_millis() as u64,
            success = success,
            "activity shut down"
        );
    }
}
