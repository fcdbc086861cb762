//! The activity abstraction shared by everything a supervisor can stop

use crate::core::cancellation::CancellationToken;
use crate::core::error::Result;
use std::fmt;
use std::sync::Arc;

/// A long-running component with a bounded shutdown operation
///
/// Partitioned pools and fire-and-forget tasks implement this trait, and so
/// can any caller type that needs to be stopped by a
/// [`Supervisor`](crate::Supervisor).
pub trait Activity: Send + Sync {
    /// Ask the activity to stop
    ///
    /// `ctx` is the caller's cancellation context. Implementations decide how
    /// much of it to honour; an already-cancelled context is usually reported
    /// back as [`ThreadError::ContextExpired`](crate::ThreadError::ContextExpired).
    ///
    /// # Errors
    ///
    /// Returns an error if the activity could not shut down cleanly
    fn shutdown(&self, ctx: &CancellationToken) -> Result<()>;

    /// Name used in logs and shutdown reports
    fn name(&self) -> &str {
        "activity"
    }
}

impl<A: Activity + ?Sized> Activity for Arc<A> {
    fn shutdown(&self, ctx: &CancellationToken) -> Result<()> {
        (**self).shutdown(ctx)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl fmt::Debug for dyn Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Activity({})", self.name())
    }
}

/// A shared, type-erased activity as stored by a supervisor
pub type SharedActivity = Arc<dyn Activity>;

/// Adapts a closure into an [`Activity`]
pub struct ClosureActivity<F>
where
    F: Fn(&CancellationToken) -> Result<()> + Send + Sync,
{
    closure: F,
    name: String,
}

impl<F> ClosureActivity<F>
where
    F: Fn(&CancellationToken) -> Result<()> + Send + Sync,
{
    /// Create a new closure activity
    pub fn new(closure: F) -> Self {
        Self::with_name(closure, "ClosureActivity")
    }

    /// Create a new closure activity with a custom name
    pub fn with_name<S: Into<String>>(closure: F, name: S) -> Self {
        Self {
            closure,
            name: name.into(),
        }
    }
}

impl<F> Activity for ClosureActivity<F>
where
    F: Fn(&CancellationToken) -> Result<()> + Send + Sync,
{
    fn shutdown(&self, ctx: &CancellationToken) -> Result<()> {
        (self.closure)(ctx)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
