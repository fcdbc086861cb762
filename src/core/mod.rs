//! Core types and traits for the background system

pub mod activity;
pub mod cancellation;
pub mod error;

pub use activity::{Activity, ClosureActivity, SharedActivity};
pub use cancellation::{CancellationCallbackGuard, CancellationReason, CancellationToken};
pub use error::{BoxError, CallbackStage, Result, ThreadError};
