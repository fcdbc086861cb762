//! # Rust Background System
//!
//! Concurrency coordination for long-running background work on OS threads.
//!
//! ## Features
//!
//! - **Partitioned Pool**: N workers cooperatively traverse an index range in
//!   fixed-size blocks, claiming disjoint blocks from a shared cursor
//! - **Cooperative Cancellation**: a write-once stop signal that workers check
//!   before every claim, never interrupting a block in flight
//! - **Fire-and-forget Tasks**: launch independent units and join them all at
//!   shutdown
//! - **Shutdown Supervisor**: stops every registered activity once, in
//!   registration order, logging failures instead of aborting
//! - **Signal Wiring**: optional SIGINT/SIGTERM hookup (`signals` feature)
//!
//! ## Quick Start
//!
//! ```rust
//! use rust_background_system::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let source = CancellationToken::new();
//! let supervisor = Supervisor::listen(SupervisorConfig::default(), &source)?;
//!
//! let pool = Arc::new(PartitionedPool::new(
//!     PoolConfig::new(4)
//!         .with_read(|offset, block| Ok((offset, block)))
//!         .with_execute(|(offset, block), _| {
//!             println!("processing [{}, {})", offset, offset + block);
//!             Ok(())
//!         })
//!         .with_interval(|| Ok((0, 1000)))
//!         .with_block_size(100),
//! )?);
//! let runner = Arc::new(Task::new());
//!
//! // The pool is stopped before the task driving it is joined
//! supervisor.register(Arc::clone(&pool))?;
//! supervisor.register(Arc::clone(&runner))?;
//!
//! let driven = Arc::clone(&pool);
//! runner.go(move || {
//!     if let Err(e) = driven.start() {
//!         eprintln!("pool failed: {}", e);
//!     }
//! });
//!
//! // A signal handler would normally do this
//! source.cancel();
//! assert_eq!(supervisor.state(), SupervisorState::Quiesced);
//! # Ok(())
//! # }
//! ```
//!
//! ## Partitioning
//!
//! ```rust
//! use rust_background_system::prelude::*;
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let offsets = Arc::new(Mutex::new(Vec::new()));
//! let seen = Arc::clone(&offsets);
//!
//! let pool = PartitionedPool::new(
//!     PoolConfig::new(3)
//!         .with_read(|offset, _block| Ok(offset))
//!         .with_execute(move |offset, _block| {
//!             seen.lock().push(offset);
//!             Ok(())
//!         })
//!         .with_interval(|| Ok((0, 25)))
//!         .with_block_size(10),
//! )?;
//! pool.start()?;
//!
//! let mut offsets = offsets.lock().clone();
//! offsets.sort();
//! assert_eq!(offsets, vec![0, 10, 20]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod pool;
pub mod prelude;
#[cfg(feature = "signals")]
pub mod signal;
pub mod supervisor;
pub mod task;
#[cfg(feature = "tracing")]
pub mod tracing;

pub use crate::core::{
    Activity, BoxError, CallbackStage, CancellationReason, CancellationToken, ClosureActivity,
    Result, SharedActivity, ThreadError,
};
pub use pool::{PartitionedPool, PoolConfig, PoolReport, WorkerStatSnapshot, WorkerStats};
pub use supervisor::{
    ActivityOutcome, ShutdownReport, Supervisor, SupervisorConfig, SupervisorState,
};
pub use task::{JoinPolicy, Task};
