//! Fire-and-forget task launcher with a blocking join

use crate::core::error::panic_message;
use crate::core::{Activity, CancellationToken, Result, ThreadError};
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

/// How [`Task::shutdown`](Activity::shutdown) treats its cancellation context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinPolicy {
    /// Wait for every outstanding unit regardless of the context
    #[default]
    IgnoreContext,
    /// Give up with [`ThreadError::ContextExpired`] as soon as the context
    /// is cancelled
    HonorContext,
}

#[derive(Debug, Default)]
struct Outstanding {
    count: Mutex<usize>,
    drained: Condvar,
}

impl Outstanding {
    fn add(&self) {
        *self.count.lock() += 1;
    }

    fn done(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.drained.notify_all();
        }
    }
}

/// Decrements the outstanding count even if the unit panics
struct DoneGuard(Arc<Outstanding>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        self.0.done();
    }
}

/// Launches independent units of work and joins them all at shutdown
///
/// Units get no result channel; they report through their own closures.
/// Launching new units while a join is in progress is not supported.
///
/// ```rust
/// use rust_background_system::Task;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let task = Task::new();
/// let counter = Arc::new(AtomicUsize::new(0));
///
/// for _ in 0..8 {
///     let counter = Arc::clone(&counter);
///     task.go(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     });
/// }
///
/// task.wait();
/// assert_eq!(counter.load(Ordering::SeqCst), 8);
/// ```
#[derive(Debug, Default)]
pub struct Task {
    outstanding: Arc<Outstanding>,
    policy: JoinPolicy,
    name: Option<String>,
}

impl Task {
    /// Create a task that ignores its shutdown context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a task with an explicit join policy
    pub fn with_join_policy(policy: JoinPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Set the name used in logs and shutdown reports
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Launch `f` on its own thread without blocking the caller
    ///
    /// The unit is counted as outstanding before the thread starts. A panic
    /// inside `f` is logged and still counts as completion.
    pub fn go<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.outstanding.add();
        let guard = DoneGuard(Arc::clone(&self.outstanding));
        let name = self.name().to_string();

        let spawned = thread::Builder::new()
            .name(format!("{}-unit", name))
            .spawn(move || {
                let _guard = guard;
                if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
                    log::error!(
                        "Task '{}': unit panicked: {}",
                        name,
                        panic_message(payload.as_ref())
                    );
                }
            });

        // The closure (and its guard) is dropped on failure, releasing the count
        if let Err(e) = spawned {
            log::error!(
                "Task '{}': failed to launch unit: {}",
                self.name(),
                ThreadError::spawn_with_source(0, "Failed to spawn task unit", e)
            );
        }
    }

    /// Block until every launched unit has completed
    pub fn wait(&self) {
        let mut count = self.outstanding.count.lock();
        while *count > 0 {
            self.outstanding.drained.wait(&mut count);
        }
    }

    /// Block until every launched unit has completed or `ctx` is cancelled
    ///
    /// # Errors
    ///
    /// [`ThreadError::ContextExpired`] if `ctx` is cancelled while units are
    /// still outstanding
    pub fn wait_with_context(&self, ctx: &CancellationToken) -> Result<()> {
        // Registered before taking the count lock: an already cancelled ctx
        // runs the callback right here.
        let outstanding = Arc::clone(&self.outstanding);
        let _wake = ctx.on_cancel(move || {
            let _count = outstanding.count.lock();
            outstanding.drained.notify_all();
        });

        let mut count = self.outstanding.count.lock();
        while *count > 0 {
            if ctx.is_cancelled() {
                let pending = *count;
                drop(count);
                log::warn!(
                    "Task '{}': giving up on {} outstanding units",
                    self.name(),
                    pending
                );
                return ctx.check();
            }
            self.outstanding.drained.wait(&mut count);
        }
        Ok(())
    }

    /// Number of units launched but not yet completed
    pub fn outstanding(&self) -> usize {
        *self.outstanding.count.lock()
    }

    /// The configured join policy
    pub fn join_policy(&self) -> JoinPolicy {
        self.policy
    }
}

impl Activity for Task {
    fn shutdown(&self, ctx: &CancellationToken) -> Result<()> {
        match self.policy {
            JoinPolicy::IgnoreContext => {
                self.wait();
                Ok(())
            }
            JoinPolicy::HonorContext => self.wait_with_context(ctx),
        }
    }

    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("task")
    }
}
