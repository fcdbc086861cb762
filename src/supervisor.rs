//! Shutdown supervisor for background activities

use crate::core::error::panic_message;
use crate::core::{Activity, CancellationToken, Result, SharedActivity, ThreadError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle of a [`Supervisor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SupervisorState {
    /// Accepting registrations
    Idle,
    /// Shutting activities down
    ShuttingDown,
    /// Every activity's shutdown has returned
    Quiesced,
}

impl SupervisorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SupervisorState::Idle,
            1 => SupervisorState::ShuttingDown,
            _ => SupervisorState::Quiesced,
        }
    }
}

/// Configuration for a supervisor
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Name used in logs
    pub name: String,
    /// Deadline for the shared shutdown context.
    /// Default: None (the context stays open until every activity returned)
    ///
    /// The deadline only cancels the context handed to activities; activities
    /// that ignore their context are still waited for.
    pub shutdown_timeout: Option<Duration>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            name: "background".to_string(),
            shutdown_timeout: None,
        }
    }
}

impl SupervisorConfig {
    /// Create a default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the supervisor name
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Set a deadline for the shared shutdown context
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if matches!(self.shutdown_timeout, Some(t) if t.is_zero()) {
            return Err(ThreadError::invalid_config(
                "shutdown_timeout",
                "Shutdown timeout must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Result of shutting down one registered activity
#[derive(Debug, Clone, Serialize)]
pub struct ActivityOutcome {
    /// Activity name
    pub name: String,
    /// Position in registration order
    pub position: usize,
    /// Error reported by the activity, if any
    pub error: Option<String>,
    /// Time spent in the activity's shutdown
    pub elapsed: Duration,
}

/// Summary of a completed shutdown
#[derive(Debug, Clone, Serialize)]
pub struct ShutdownReport {
    /// When the trigger fired
    pub started_at: DateTime<Utc>,
    /// When the last activity returned
    pub finished_at: DateTime<Utc>,
    /// One entry per registration, in registration order
    pub outcomes: Vec<ActivityOutcome>,
}

impl ShutdownReport {
    /// Outcomes that carried an error
    pub fn failures(&self) -> impl Iterator<Item = &ActivityOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }

    /// Whether every activity shut down cleanly
    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Render the report as JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ThreadError::other(e.to_string()))
    }
}

/// Coordinates the graceful shutdown of registered activities
///
/// Activities are shut down once, sequentially, in registration order. A
/// failing activity is logged and the sequence carries on.
///
/// # Example
///
/// ```rust
/// use rust_background_system::prelude::*;
/// use std::sync::Arc;
///
/// # fn main() -> Result<()> {
/// let source = CancellationToken::new();
/// let supervisor = Supervisor::listen(SupervisorConfig::default(), &source)?;
///
/// let task = Arc::new(Task::new());
/// supervisor.register(Arc::clone(&task))?;
/// task.go(|| println!("working"));
///
/// // Usually done by a signal handler
/// source.cancel();
///
/// assert_eq!(supervisor.state(), SupervisorState::Quiesced);
/// assert_eq!(task.outstanding(), 0);
/// # Ok(())
/// # }
/// ```
pub struct Supervisor {
    config: SupervisorConfig,
    activities: Mutex<Vec<SharedActivity>>,
    state: AtomicU8,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("config", &self.config)
            .field("activities", &self.len())
            .field("state", &self.state())
            .finish()
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self {
            config: SupervisorConfig::default(),
            activities: Mutex::new(Vec::new()),
            state: AtomicU8::new(0),
        }
    }
}

impl Supervisor {
    /// Create a supervisor that is only triggered through [`quit`](Self::quit)
    pub fn new(config: SupervisorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Default::default()
        })
    }

    /// Create a supervisor that quits when `source` is cancelled
    ///
    /// The source only holds a weak reference, so dropping the supervisor
    /// detaches it. If `source` is already cancelled, the supervisor quits
    /// immediately with an empty registry.
    pub fn listen(config: SupervisorConfig, source: &CancellationToken) -> Result<Arc<Self>> {
        let supervisor = Arc::new(Self::new(config)?);
        let weak = Arc::downgrade(&supervisor);

        source.on_cancel_always(move || {
            if let Some(supervisor) = weak.upgrade() {
                log::info!(
                    "Supervisor '{}': termination requested",
                    supervisor.config.name
                );
                supervisor.quit();
            }
        });

        Ok(supervisor)
    }

    /// Append an activity to the registry
    ///
    /// The same activity may be registered more than once and is then shut
    /// down once per registration.
    ///
    /// # Errors
    ///
    /// [`ThreadError::RegistryClosed`] once shutdown has begun
    pub fn register<A>(&self, activity: A) -> Result<()>
    where
        A: Activity + 'static,
    {
        self.register_shared(Arc::new(activity))
    }

    /// Append an already shared activity to the registry
    pub fn register_shared(&self, activity: SharedActivity) -> Result<()> {
        let mut activities = self.activities.lock();
        if self.state() != SupervisorState::Idle {
            return Err(ThreadError::RegistryClosed);
        }
        log::debug!(
            "Supervisor '{}': observing '{}'",
            self.config.name,
            activity.name()
        );
        activities.push(activity);
        Ok(())
    }

    /// Shut every registered activity down
    ///
    /// Returns `None` if shutdown was already triggered. Otherwise each
    /// activity's shutdown runs with one shared context, in registration
    /// order; errors are logged and collected, never raised.
    pub fn quit(&self) -> Option<ShutdownReport> {
        let activities = {
            let activities = self.activities.lock();
            if self
                .state
                .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return None;
            }
            activities.clone()
        };

        Some(self.shutdown_all(&activities))
    }

    fn shutdown_all(&self, activities: &[SharedActivity]) -> ShutdownReport {
        let started_at = Utc::now();
        let ctx = match self.config.shutdown_timeout {
            Some(timeout) => CancellationToken::with_timeout(timeout),
            None => CancellationToken::new(),
        };

        log::info!(
            "Supervisor '{}': shutting down {} background activities",
            self.config.name,
            activities.len()
        );

        let mut outcomes = Vec::with_capacity(activities.len());
        for (position, activity) in activities.iter().enumerate() {
            let began = Instant::now();
            let result = catch_unwind(AssertUnwindSafe(|| activity.shutdown(&ctx)))
                .unwrap_or_else(|payload| {
                    Err(ThreadError::activity_panic(
                        activity.name(),
                        panic_message(payload.as_ref()),
                    ))
                });
            let elapsed = began.elapsed();

            #[cfg(feature = "tracing")]
            crate::tracing::metrics::record_activity_shutdown(
                activity.name(),
                elapsed,
                result.is_ok(),
            );

            let error = match result {
                Ok(()) => None,
                Err(e) => {
                    log::error!(
                        "Supervisor '{}': activity '{}' failed to shut down: {}",
                        self.config.name,
                        activity.name(),
                        e
                    );
                    Some(e.to_string())
                }
            };
            outcomes.push(ActivityOutcome {
                name: activity.name().to_string(),
                position,
                error,
                elapsed,
            });
        }

        ctx.cancel();
        self.state.store(2, Ordering::Release);

        let report = ShutdownReport {
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };
        log::info!(
            "Supervisor '{}': all background activities stopped ({} failed)",
            self.config.name,
            report.failures().count()
        );
        report
    }

    /// Current lifecycle state
    pub fn state(&self) -> SupervisorState {
        SupervisorState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether shutdown has been triggered
    pub fn is_quit(&self) -> bool {
        self.state() != SupervisorState::Idle
    }

    /// Number of registrations
    pub fn len(&self) -> usize {
        self.activities.lock().len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ClosureActivity;
    use std::sync::atomic::AtomicUsize;

    fn recording(
        name: &str,
        journal: Arc<Mutex<Vec<String>>>,
        fail: bool,
    ) -> ClosureActivity<impl Fn(&CancellationToken) -> Result<()> + Send + Sync> {
        let label = name.to_string();
        ClosureActivity::with_name(
            move |_ctx: &CancellationToken| {
                journal.lock().push(label.clone());
                if fail {
                    Err(ThreadError::other(format!("{} refused", label)))
                } else {
                    Ok(())
                }
            },
            name,
        )
    }

    #[test]
    fn test_shutdown_in_registration_order() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let supervisor = Supervisor::new(SupervisorConfig::default()).unwrap();

        supervisor.register(recording("a", Arc::clone(&journal), false)).unwrap();
        supervisor.register(recording("b", Arc::clone(&journal), true)).unwrap();
        supervisor.register(recording("c", Arc::clone(&journal), false)).unwrap();

        let report = supervisor.quit().expect("first quit runs shutdown");

        assert_eq!(*journal.lock(), vec!["a", "b", "c"]);
        assert_eq!(report.outcomes.len(), 3);
        assert!(!report.is_clean());
        let failures: Vec<_> = report.failures().map(|o| o.name.as_str()).collect();
        assert_eq!(failures, vec!["b"]);
        assert_eq!(supervisor.state(), SupervisorState::Quiesced);
    }

    #[test]
    fn test_panicking_activity_is_contained() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let supervisor = Supervisor::new(SupervisorConfig::default()).unwrap();

        supervisor
            .register(ClosureActivity::with_name(
                |_ctx: &CancellationToken| -> Result<()> { panic!("cache exploded") },
                "cache",
            ))
            .unwrap();
        supervisor.register(recording("db", Arc::clone(&journal), false)).unwrap();

        let report = supervisor.quit().expect("first quit runs shutdown");

        assert_eq!(*journal.lock(), vec!["db"]);
        assert_eq!(supervisor.state(), SupervisorState::Quiesced);
        assert!(supervisor.quit().is_none());

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "cache");
        let error = failures[0].error.as_deref().unwrap_or_default();
        assert!(error.contains("cache exploded"));
    }

    #[test]
    fn test_panicking_activity_does_not_escape_listen() {
        let source = CancellationToken::new();
        let supervisor = Supervisor::listen(SupervisorConfig::default(), &source).unwrap();
        supervisor
            .register(ClosureActivity::new(|_ctx: &CancellationToken| -> Result<()> {
                panic!("refused to stop")
            }))
            .unwrap();

        source.cancel();

        assert!(source.is_cancelled());
        assert_eq!(supervisor.state(), SupervisorState::Quiesced);
    }

    #[test]
    fn test_quit_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let supervisor = Supervisor::new(SupervisorConfig::default()).unwrap();
        supervisor
            .register(ClosureActivity::new(move |_ctx: &CancellationToken| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();

        assert!(supervisor.quit().is_some());
        assert!(supervisor.quit().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_duplicate_registration_shuts_down_twice() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let activity: SharedActivity =
            Arc::new(ClosureActivity::new(move |_ctx: &CancellationToken| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }));

        let supervisor = Supervisor::new(SupervisorConfig::default()).unwrap();
        supervisor.register_shared(Arc::clone(&activity)).unwrap();
        supervisor.register_shared(activity).unwrap();
        assert_eq!(supervisor.len(), 2);

        supervisor.quit();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_register_after_quit_is_rejected() {
        let supervisor = Supervisor::new(SupervisorConfig::default()).unwrap();
        assert!(supervisor.is_empty());
        supervisor.quit();

        let result = supervisor.register(ClosureActivity::new(|_ctx: &CancellationToken| Ok(())));
        assert!(matches!(result, Err(ThreadError::RegistryClosed)));
        assert!(supervisor.is_quit());
    }

    #[test]
    fn test_context_is_open_during_shutdown() {
        let supervisor = Supervisor::new(SupervisorConfig::default()).unwrap();
        supervisor
            .register(ClosureActivity::new(|ctx: &CancellationToken| ctx.check()))
            .unwrap();

        let report = supervisor.quit().unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn test_shutdown_timeout_expires_context() {
        let config = SupervisorConfig::new().with_shutdown_timeout(Duration::from_millis(20));
        let supervisor = Supervisor::new(config).unwrap();
        supervisor
            .register(ClosureActivity::with_name(
                |ctx: &CancellationToken| {
                    ctx.wait_timeout(Duration::from_secs(5));
                    ctx.check()
                },
                "slow",
            ))
            .unwrap();
        supervisor
            .register(ClosureActivity::with_name(|_ctx: &CancellationToken| Ok(()), "fast"))
            .unwrap();

        let report = supervisor.quit().unwrap();
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes[0].error.is_some());
        assert!(report.outcomes[1].error.is_none());
    }

    #[test]
    fn test_zero_timeout_is_invalid() {
        let config = SupervisorConfig::new().with_shutdown_timeout(Duration::ZERO);
        assert!(matches!(
            Supervisor::new(config),
            Err(ThreadError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_listen_triggers_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let source = CancellationToken::new();
        let supervisor = Supervisor::listen(SupervisorConfig::default(), &source).unwrap();
        supervisor
            .register(ClosureActivity::new(move |_ctx: &CancellationToken| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();

        source.cancel();
        source.cancel();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.state(), SupervisorState::Quiesced);
        assert!(supervisor.quit().is_none());
    }

    #[test]
    fn test_listen_does_not_keep_supervisor_alive() {
        let source = CancellationToken::new();
        let supervisor = Supervisor::listen(SupervisorConfig::default(), &source).unwrap();
        let weak = Arc::downgrade(&supervisor);
        drop(supervisor);

        assert!(weak.upgrade().is_none());
        source.cancel();
    }

    #[test]
    fn test_report_to_json() {
        let supervisor = Supervisor::new(SupervisorConfig::default()).unwrap();
        supervisor
            .register(ClosureActivity::with_name(|_ctx: &CancellationToken| Ok(()), "db"))
            .unwrap();

        let report = supervisor.quit().unwrap();
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["outcomes"][0]["name"], "db");
        assert!(json["started_at"].is_string());
    }
}
