//! Partitioned work-pool and its building blocks

pub mod config;
pub mod cursor;
pub mod partitioned;
pub mod worker;

pub use config::{ExecuteFn, IntervalFn, PoolConfig, ReadFn};
pub use cursor::{Cursor, StopSignal};
pub use partitioned::{PartitionedPool, PoolReport};
pub use worker::{WorkerStatSnapshot, WorkerStats};
