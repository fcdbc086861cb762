//! Convenient re-exports for common types and traits

pub use crate::core::{
    Activity, BoxError, CancellationReason, CancellationToken, ClosureActivity, Result,
    SharedActivity, ThreadError,
};
pub use crate::pool::{PartitionedPool, PoolConfig, PoolReport, WorkerStats};
pub use crate::supervisor::{ShutdownReport, Supervisor, SupervisorConfig, SupervisorState};
pub use crate::task::{JoinPolicy, Task};
