//! Error types for the background system

/// Result type for background system operations
pub type Result<T> = std::result::Result<T, ThreadError>;

/// Boxed error returned by caller-supplied callbacks
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Which callback of a partitioned pool failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum CallbackStage {
    /// The read callback
    Read,
    /// The execute callback
    Execute,
}

impl std::fmt::Display for CallbackStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallbackStage::Read => write!(f, "read"),
            CallbackStage::Execute => write!(f, "execute"),
        }
    }
}

/// Errors that can occur in the background system
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ThreadError {
    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// The interval callback failed while building a pool
    #[error("Failed to produce work interval: {source}")]
    RangeProduction {
        /// Error returned by the callback
        #[source]
        source: BoxError,
    },

    /// A read or execute callback failed inside a worker
    #[error("Worker #{worker_id} {stage} failed at offset {offset}: {message}")]
    Callback {
        /// ID of the worker that ran the callback
        worker_id: usize,
        /// Offset of the claimed block
        offset: usize,
        /// Which callback failed
        stage: CallbackStage,
        /// Error message reported by the callback
        message: String,
    },

    /// The cancellation context was already done
    #[error("Cancellation context expired: {reason}")]
    ContextExpired {
        /// Why the context was cancelled
        reason: String,
    },

    /// The pool has already been started once
    #[error("Pool '{pool_name}' has already been started")]
    AlreadyStarted {
        /// Name of the pool
        pool_name: String,
    },

    /// Registration attempted after shutdown began
    #[error("Supervisor is shutting down, no more activities can be registered")]
    RegistryClosed,

    /// Failed to spawn a worker thread with details
    #[error("Failed to spawn worker thread #{thread_id}: {message}")]
    SpawnError {
        /// ID of the thread that failed to spawn
        thread_id: usize,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Worker panic with details
    #[error("Worker thread #{thread_id} panicked: {message}")]
    WorkerPanic {
        /// ID of the panicked thread
        thread_id: usize,
        /// Panic message
        message: String,
    },

    /// An activity panicked while shutting down
    #[error("Activity '{activity}' panicked during shutdown: {message}")]
    ActivityPanic {
        /// Name of the activity
        activity: String,
        /// Panic message
        message: String,
    },

    /// General error
    #[error("{0}")]
    Other(String),
}

impl ThreadError {
    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        ThreadError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a range production error from the callback's error
    pub fn range_production(source: impl Into<BoxError>) -> Self {
        ThreadError::RangeProduction {
            source: source.into(),
        }
    }

    /// Create a callback failure error
    pub fn callback(
        worker_id: usize,
        offset: usize,
        stage: CallbackStage,
        source: impl std::fmt::Display,
    ) -> Self {
        ThreadError::Callback {
            worker_id,
            offset,
            stage,
            message: source.to_string(),
        }
    }

    /// Create a context expired error
    pub fn context_expired(reason: impl Into<String>) -> Self {
        ThreadError::ContextExpired {
            reason: reason.into(),
        }
    }

    /// Create an already started error
    pub fn already_started(pool_name: impl Into<String>) -> Self {
        ThreadError::AlreadyStarted {
            pool_name: pool_name.into(),
        }
    }

    /// Create a spawn error with source
    pub fn spawn_with_source(
        thread_id: usize,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        ThreadError::SpawnError {
            thread_id,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a worker panic error
    pub fn worker_panic(thread_id: usize, message: impl Into<String>) -> Self {
        ThreadError::WorkerPanic {
            thread_id,
            message: message.into(),
        }
    }

    /// Create an activity panic error
    pub fn activity_panic(activity: impl Into<String>, message: impl Into<String>) -> Self {
        ThreadError::ActivityPanic {
            activity: activity.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        ThreadError::Other(msg.into())
    }

    /// Returns true for configuration errors detected at construction
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, ThreadError::InvalidConfig { .. })
    }
}

/// Extracts a printable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
