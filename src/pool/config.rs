//! Configuration for partitioned pools

use crate::core::{BoxError, Result, ThreadError};
use std::sync::Arc;

/// Reads the block starting at `offset`; receives the configured block size
pub type ReadFn<D> =
    Arc<dyn Fn(usize, usize) -> std::result::Result<D, BoxError> + Send + Sync>;

/// Processes the data of one block; receives the configured block size
pub type ExecuteFn<D> = Arc<dyn Fn(D, usize) -> std::result::Result<(), BoxError> + Send + Sync>;

/// Produces the `[start, limit)` interval a pool traverses
pub type IntervalFn = Box<dyn FnOnce() -> std::result::Result<(usize, usize), BoxError> + Send>;

/// Configuration for a [`PartitionedPool`](crate::PartitionedPool)
///
/// The three callbacks and the block size have no defaults and must be set.
///
/// ```rust
/// use rust_background_system::prelude::*;
///
/// let config = PoolConfig::<Vec<u8>>::new(4)
///     .with_read(|_offset, block| Ok(vec![0u8; block]))
///     .with_execute(|_data, _block| Ok(()))
///     .with_interval(|| Ok((0, 1000)))
///     .with_block_size(100)
///     .with_name("ingest");
///
/// assert!(config.validate().is_ok());
/// ```
pub struct PoolConfig<D> {
    pub(crate) read: Option<ReadFn<D>>,
    pub(crate) execute: Option<ExecuteFn<D>>,
    pub(crate) interval: Option<IntervalFn>,
    /// Width of one block
    pub block_size: usize,
    /// Number of worker threads
    pub workers: usize,
    /// Pool name, used for worker thread names and logs
    pub name: String,
}

impl<D> std::fmt::Debug for PoolConfig<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConfig")
            .field("read", &self.read.as_ref().map(|_| "<fn>"))
            .field("execute", &self.execute.as_ref().map(|_| "<fn>"))
            .field("interval", &self.interval.as_ref().map(|_| "<fn>"))
            .field("block_size", &self.block_size)
            .field("workers", &self.workers)
            .field("name", &self.name)
            .finish()
    }
}

impl<D> Default for PoolConfig<D> {
    fn default() -> Self {
        Self {
            read: None,
            execute: None,
            interval: None,
            block_size: 0,
            workers: num_cpus::get(),
            name: "pool".to_string(),
        }
    }
}

impl<D> PoolConfig<D> {
    /// Create a configuration with the given number of workers
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            ..Default::default()
        }
    }

    /// Set the read callback
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_read<F>(mut self, read: F) -> Self
    where
        F: Fn(usize, usize) -> std::result::Result<D, BoxError> + Send + Sync + 'static,
    {
        self.read = Some(Arc::new(read));
        self
    }

    /// Set the execute callback
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_execute<F>(mut self, execute: F) -> Self
    where
        F: Fn(D, usize) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.execute = Some(Arc::new(execute));
        self
    }

    /// Set the interval callback, called once when the pool is built
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_interval<F>(mut self, interval: F) -> Self
    where
        F: FnOnce() -> std::result::Result<(usize, usize), BoxError> + Send + 'static,
    {
        self.interval = Some(Box::new(interval));
        self
    }

    /// Set the block size
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set the number of workers
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the pool name
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.read.is_none() {
            return Err(ThreadError::invalid_config("read", "Read callback is not set"));
        }
        if self.execute.is_none() {
            return Err(ThreadError::invalid_config(
                "execute",
                "Execute callback is not set",
            ));
        }
        if self.interval.is_none() {
            return Err(ThreadError::invalid_config(
                "interval",
                "Interval callback is not set",
            ));
        }
        if self.block_size == 0 {
            return Err(ThreadError::invalid_config(
                "block_size",
                "Block size must be greater than 0",
            ));
        }
        if self.workers == 0 {
            return Err(ThreadError::invalid_config(
                "workers",
                "Number of workers must be greater than 0",
            ));
        }
        Ok(())
    }
}
