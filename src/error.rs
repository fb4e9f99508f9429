//! Error types for event-waiter.
//!
//! All errors are strongly typed using thiserror. A timed-out wait is NOT an
//! error: it resolves the handle with [`crate::WaitOutcome::TimedOut`].

use thiserror::Error;

use crate::kind::WaitId;

/// Validation errors raised synchronously by `wait_for` and config loading.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Wait timeout must be a positive duration")]
    NonPositiveTimeout,

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Which caller-supplied closure failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStage {
    /// The wait condition.
    Condition,
    /// The match transform.
    Transform,
}

impl std::fmt::Display for CallbackStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Condition => f.write_str("condition"),
            Self::Transform => f.write_str("transform"),
        }
    }
}

/// Execution errors raised by the coordinator at runtime.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Event waiter is shutting down; no new waits are accepted")]
    ShuttingDown,

    #[error("Channel disconnected: {path}")]
    Disconnected {
        path: String,
    },

    #[error("Failed to spawn worker thread: {message}")]
    WorkerSpawn {
        message: String,
    },

    #[error("Wait {wait_id} {stage} panicked")]
    CallbackPanicked {
        wait_id: WaitId,
        stage: CallbackStage,
    },
}

/// Top-level error type for event-waiter.
#[derive(Debug, Error)]
pub enum WaitError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
}

impl WaitError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if the wait was rejected because shutdown has begun.
    #[must_use]
    pub const fn is_shutdown(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::ShuttingDown))
    }

    /// Returns a short stable label (snake_case) for logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Validation(ValidationError::NonPositiveTimeout) => "non_positive_timeout",
            Self::Validation(ValidationError::InvalidConfig { .. }) => "invalid_config",
            Self::Execution(ExecutionError::ShuttingDown) => "shutting_down",
            Self::Execution(ExecutionError::Disconnected { .. }) => "disconnected",
            Self::Execution(ExecutionError::WorkerSpawn { .. }) => "worker_spawn",
            Self::Execution(ExecutionError::CallbackPanicked { .. }) => "callback_panicked",
        }
    }
}

/// Result type alias for event-waiter operations.
pub type WaitResult<T> = Result<T, WaitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_timeout() {
        let err = ValidationError::NonPositiveTimeout;
        let msg = format!("{err}");
        assert!(msg.contains("positive"));
    }

    #[test]
    fn test_execution_error_disconnected() {
        let err = ExecutionError::Disconnected {
            path: "waiter_pool".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("waiter_pool"));
    }

    #[test]
    fn test_callback_panicked_names_stage() {
        let err = ExecutionError::CallbackPanicked {
            wait_id: WaitId::new(),
            stage: CallbackStage::Transform,
        };
        assert!(format!("{err}").contains("transform"));
    }

    #[test]
    fn test_wait_error_from_validation() {
        let err: WaitError = ValidationError::NonPositiveTimeout.into();
        assert!(err.is_validation());
        assert!(!err.is_shutdown());
        assert_eq!(err.as_label(), "non_positive_timeout");
    }

    #[test]
    fn test_wait_error_shutdown() {
        let err: WaitError = ExecutionError::ShuttingDown.into();
        assert!(err.is_execution());
        assert!(err.is_shutdown());
        assert_eq!(err.as_label(), "shutting_down");
    }
}
