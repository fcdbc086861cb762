//! Cancellation contexts
//!
//! [`CancellationToken`] is the one cancellation primitive of the crate. It is
//! used as:
//!
//! - the context handed to every [`Activity::shutdown`](crate::Activity::shutdown),
//! - the explicit cancellation source a process entry point owns and hands to
//!   a [`Supervisor`](crate::Supervisor),
//! - the write-once stop signal shared by the workers of one partitioned pool.
//!
//! Tokens support cancel callbacks and timeout-driven cancellation.
//!
//! # Example
//!
//! ```rust
//! use rust_background_system::CancellationToken;
//!
//! let source = CancellationToken::new();
//! let observer = source.clone();
//!
//! source.cancel();
//!
//! assert!(observer.is_cancelled());
//! assert!(observer.check().is_err());
//! ```

use crate::core::Result;
use crate::ThreadError;
use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

static NEXT_CALLBACK_ID: AtomicUsize = AtomicUsize::new(1);

/// Generates a unique callback ID
fn next_callback_id() -> usize {
    NEXT_CALLBACK_ID.fetch_add(1, Ordering::Relaxed)
}

/// Reason for cancellation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancellationReason {
    /// Explicitly cancelled via `cancel()`
    Manual,
    /// Cancelled due to timeout expiration
    Timeout(Duration),
    /// Cancelled by a process termination signal
    Signal,
    /// Custom cancellation reason
    Custom(String),
}

impl std::fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancellationReason::Manual => write!(f, "manually cancelled"),
            CancellationReason::Timeout(d) => write!(f, "timeout after {:?}", d),
            CancellationReason::Signal => write!(f, "termination signal received"),
            CancellationReason::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

/// Stored callback with its ID for later removal
struct StoredCallback {
    id: usize,
    callback: Box<dyn FnOnce() + Send + Sync>,
}

/// Internal state for a cancellation token
struct CancellationTokenInner {
    cancelled: AtomicBool,
    callbacks: RwLock<Vec<StoredCallback>>,
    reason: RwLock<Option<CancellationReason>>,
    /// Paired with `wakeup` for blocking waits
    wait_lock: Mutex<()>,
    wakeup: Condvar,
}

impl CancellationTokenInner {
    fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            callbacks: RwLock::new(Vec::new()),
            reason: RwLock::new(None),
            wait_lock: Mutex::new(()),
            wakeup: Condvar::new(),
        }
    }
}

/// A thread-safe cancellation token shared between a canceller and any number
/// of observers
///
/// Cancellation is one-way: once cancelled a token never returns to the open
/// state, and observing it never blocks.
///
/// # Example
///
/// ```rust
/// use rust_background_system::CancellationToken;
/// use std::thread;
/// use std::time::Duration;
///
/// let token = CancellationToken::new();
/// let token_clone = token.clone();
///
/// let handle = thread::spawn(move || {
///     while !token_clone.is_cancelled() {
///         thread::sleep(Duration::from_millis(10));
///     }
///     "Stopped"
/// });
///
/// thread::sleep(Duration::from_millis(50));
/// token.cancel();
///
/// assert_eq!(handle.join().unwrap(), "Stopped");
/// ```
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationTokenInner>,
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

impl CancellationToken {
    /// Create a new cancellation token (not cancelled)
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancellationTokenInner::new()),
        }
    }

    /// Creates a token that auto-cancels after the specified timeout
    ///
    /// A background thread waits for the deadline. If the token is cancelled
    /// earlier the thread wakes up and exits without effect.
    ///
    /// ```rust
    /// use rust_background_system::{CancellationReason, CancellationToken};
    /// use std::time::Duration;
    ///
    /// let token = CancellationToken::with_timeout(Duration::from_millis(20));
    /// assert!(token.wait_timeout(Duration::from_secs(5)));
    /// assert_eq!(
    ///     token.reason(),
    ///     Some(CancellationReason::Timeout(Duration::from_millis(20)))
    /// );
    /// ```
    pub fn with_timeout(timeout: Duration) -> Self {
        let token = Self::new();
        let token_clone = token.clone();

        std::thread::spawn(move || {
            if !token_clone.wait_timeout(timeout) {
                token_clone.cancel_with_reason(CancellationReason::Timeout(timeout));
            }
        });

        token
    }

    /// Cancel this token with default reason (Manual)
    ///
    /// Idempotent. Only the first call sets the reason.
    pub fn cancel(&self) {
        self.cancel_with_reason(CancellationReason::Manual);
    }

    /// Cancel this token with a specific reason
    ///
    /// Cancels the token, wakes blocked waiters and runs registered callbacks
    /// on the calling thread. Returns `true` only for the call that actually
    /// performed the cancellation.
    pub fn cancel_with_reason(&self, reason: CancellationReason) -> bool {
        {
            // Held across the swap so no observer sees the flag without a reason
            let mut slot = self.inner.reason.write();
            if self.inner.cancelled.swap(true, Ordering::SeqCst) {
                return false;
            }
            *slot = Some(reason);
        }

        {
            let _guard = self.inner.wait_lock.lock();
            self.inner.wakeup.notify_all();
        }

        let callbacks: Vec<_> = self.inner.callbacks.write().drain(..).collect();
        for stored in callbacks {
            (stored.callback)();
        }

        true
    }

    /// Check if this token has been cancelled
    ///
    /// Lock-free, suitable for hot loops.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Returns the cancellation reason (if cancelled)
    pub fn reason(&self) -> Option<CancellationReason> {
        self.inner.reason.read().clone()
    }

    /// Returns [`ThreadError::ContextExpired`] if cancelled, `Ok(())` otherwise
    ///
    /// ```rust
    /// use rust_background_system::{CancellationToken, ThreadError};
    ///
    /// fn drain(ctx: &CancellationToken) -> Result<(), ThreadError> {
    ///     for _ in 0..100 {
    ///         ctx.check()?;
    ///     }
    ///     Ok(())
    /// }
    ///
    /// let ctx = CancellationToken::new();
    /// assert!(drain(&ctx).is_ok());
    /// ctx.cancel();
    /// assert!(drain(&ctx).is_err());
    /// ```
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            let reason_str = self
                .reason()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            Err(ThreadError::context_expired(reason_str))
        } else {
            Ok(())
        }
    }

    /// Blocks until the token is cancelled or `timeout` elapses
    ///
    /// Returns whether the token is cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.wait_lock.lock();
        while !self.is_cancelled() {
            if self
                .inner
                .wakeup
                .wait_until(&mut guard, deadline)
                .timed_out()
            {
                return self.is_cancelled();
            }
        }
        true
    }

    /// Registers a callback to run when cancelled
    ///
    /// Returns a guard that unregisters the callback when dropped. If the
    /// token is already cancelled the callback runs immediately on the
    /// calling thread.
    ///
    /// ```rust
    /// use rust_background_system::CancellationToken;
    /// use std::sync::atomic::{AtomicBool, Ordering};
    /// use std::sync::Arc;
    ///
    /// let token = CancellationToken::new();
    /// let called = Arc::new(AtomicBool::new(false));
    /// let called_clone = Arc::clone(&called);
    ///
    /// let _guard = token.on_cancel(move || {
    ///     called_clone.store(true, Ordering::SeqCst);
    /// });
    ///
    /// token.cancel();
    /// assert!(called.load(Ordering::SeqCst));
    /// ```
    pub fn on_cancel<F>(&self, callback: F) -> CancellationCallbackGuard
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        let id = next_callback_id();

        // The flag is re-checked under the callbacks lock so a concurrent
        // cancel either drains this callback or we run it here.
        let run_now = {
            let mut callbacks = self.inner.callbacks.write();
            if self.is_cancelled() {
                Some(callback)
            } else {
                callbacks.push(StoredCallback {
                    id,
                    callback: Box::new(callback),
                });
                None
            }
        };
        if let Some(callback) = run_now {
            callback();
        }

        CancellationCallbackGuard {
            token: Some(self.clone()),
            callback_id: id,
        }
    }

    /// Registers a callback that always runs when cancelled
    pub fn on_cancel_always<F>(&self, callback: F)
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        self.on_cancel(callback).detach();
    }

    fn remove_callback(&self, callback_id: usize) {
        self.inner.callbacks.write().retain(|c| c.id != callback_id);
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that unregisters a callback when dropped
pub struct CancellationCallbackGuard {
    token: Option<CancellationToken>,
    callback_id: usize,
}

impl Drop for CancellationCallbackGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            if !token.is_cancelled() {
                token.remove_callback(self.callback_id);
            }
        }
    }
}

impl CancellationCallbackGuard {
    /// Detaches the guard, leaving the callback registered
    pub fn detach(mut self) {
        self.token = None;
    }
}
