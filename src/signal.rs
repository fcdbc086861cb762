//! Process termination wiring
//!
//! Connects SIGINT and SIGTERM (Ctrl-C / Ctrl-Break / console close on
//! Windows) to a [`CancellationToken`] owned by the process entry point.
//! Pass the same token to [`Supervisor::listen`](crate::Supervisor::listen)
//! and the first signal shuts every registered activity down.
//!
//! ```rust,no_run
//! use rust_background_system::prelude::*;
//! use rust_background_system::signal::install_termination_handler;
//!
//! # fn main() -> Result<()> {
//! let source = CancellationToken::new();
//! install_termination_handler(source.clone())?;
//! let supervisor = Supervisor::listen(SupervisorConfig::default(), &source)?;
//! # let _ = supervisor;
//! # Ok(())
//! # }
//! ```

use crate::core::{CancellationReason, CancellationToken, Result, ThreadError};

/// Cancel `source` on the first termination signal
///
/// Later signals are ignored because cancellation happens only once. The
/// handler runs on a dedicated thread, so the supervisor's shutdown sequence
/// executes there.
///
/// # Errors
///
/// Returns an error if a handler is already installed for this process or
/// the platform refused the subscription.
pub fn install_termination_handler(source: CancellationToken) -> Result<()> {
    ctrlc::set_handler(move || {
        if source.cancel_with_reason(CancellationReason::Signal) {
            log::info!("Termination signal received (^C again is ignored while shutting down)");
        }
    })
    .map_err(|e| ThreadError::other(format!("Failed to install termination handler: {}", e)))
}
