//! Error types used by the pod runtime, beans and signal handlers.
//!
//! This module defines three enums:
//!
//! - [`PodError`]: errors returned by the [`Pod`](crate::Pod) API itself (lifecycle misuse,
//!   unknown bean types, failed lookups).
//! - [`BeanError`]: errors returned by bean computations and signal handlers.
//! - [`HandlerError`]: the isolated outcome of a failed signal handler.
//!
//! `PodError` and `BeanError` provide `as_label` for logs/metrics.

use std::any::Any;

use thiserror::Error;

use crate::core::PodState;

/// # Errors produced by the pod runtime.
///
/// Only these reach the caller of the [`Pod`](crate::Pod) API. Failures of individual beans
/// are absorbed into bookkeeping and logged, never returned from `run()`.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PodError {
    /// A bean descriptor named a `core` the catalog does not know.
    #[error("invalid bean type: no factory registered for core {core:?}")]
    InvalidBeanType {
        /// The unresolved core identifier.
        core: String,
    },

    /// A bean id or label is unknown to the pod.
    #[error("bean not found: {target}")]
    NotFound {
        /// The id or label that failed to resolve.
        target: String,
    },

    /// A lifecycle operation was invoked outside of its legal state.
    #[error("invalid state transition: cannot {op} while pod is {state}")]
    InvalidState {
        /// The rejected operation.
        op: &'static str,
        /// The state the pod was in.
        state: PodState,
    },

    /// A bean context outlived its pod.
    #[error("pod is gone")]
    Detached,

    /// The async runtime could not be built by [`launch`](crate::launch).
    #[error("failed to build runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl PodError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use beanpod::PodError;
    ///
    /// let err = PodError::InvalidBeanType { core: "nope".into() };
    /// assert_eq!(err.as_label(), "pod_invalid_bean_type");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PodError::InvalidBeanType { .. } => "pod_invalid_bean_type",
            PodError::NotFound { .. } => "pod_not_found",
            PodError::InvalidState { .. } => "pod_invalid_state",
            PodError::Detached => "pod_detached",
            PodError::Runtime(_) => "pod_runtime",
        }
    }

    pub(crate) fn not_found(target: impl ToString) -> Self {
        PodError::NotFound {
            target: target.to_string(),
        }
    }
}

/// # Errors produced by bean computations and signal handlers.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum BeanError {
    /// Execution failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The bean observed cancellation and gave up; recorded as cancelled, not failed.
    #[error("context cancelled")]
    Canceled,
}

impl BeanError {
    /// Shorthand for [`BeanError::Fail`].
    pub fn fail(error: impl ToString) -> Self {
        BeanError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BeanError::Fail { .. } => "bean_failed",
            BeanError::Canceled => "bean_canceled",
        }
    }
}

/// Failure of a single signal handler during a publish.
///
/// Handler failures are isolated: they are reported in the publish outcome and never
/// prevent the other handlers from running.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The handler returned an error.
    #[error("handler failed: {0}")]
    Failed(#[from] BeanError),

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        assert_eq!(PodError::not_found("worker").as_label(), "pod_not_found");
        assert_eq!(
            PodError::InvalidState {
                op: "stop",
                state: PodState::Idle
            }
            .as_label(),
            "pod_invalid_state"
        );
        assert_eq!(BeanError::fail("boom").as_label(), "bean_failed");
        assert_eq!(BeanError::Canceled.as_label(), "bean_canceled");
    }

    #[test]
    fn test_invalid_state_message() {
        let err = PodError::InvalidState {
            op: "register",
            state: PodState::Running,
        };
        assert_eq!(
            err.to_string(),
            "invalid state transition: cannot register while pod is running"
        );
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42u8)), "unknown panic");
    }
}
