//! Unified error handling for qnactl-core
//!
//! Transport, protocol and service errors abort the current call and are
//! handed back to the caller. A failed operation is normally reported as an
//! [`OperationOutcome::Failed`](crate::operation::OperationOutcome) value and
//! only becomes [`CoreError::OperationFailed`] when the caller asks for it.
//!
//! # Example
//!
//! ```rust
//! use qnactl_core::{CoreError, ErrorDetail};
//!
//! let err = CoreError::OperationFailed(ErrorDetail::with_message("quota exceeded"));
//! assert!(err.is_operation_failed());
//! assert!(!err.is_timeout());
//! ```

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;
use crate::error_detail::ErrorDetail;

/// Which bound a poll loop ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Deadline(Duration),
    Attempts(u32),
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutKind::Deadline(d) => write!(f, "after {:?}", d),
            TimeoutKind::Attempts(n) => write!(f, "after {} status checks", n),
        }
    }
}

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Connection failure, timeout or other network error
    #[error("Transport error while {context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    /// Response did not have the expected shape
    #[error("Protocol error: {message}")]
    Protocol {
        message: String,
        /// Response body, kept for diagnostics
        body: Option<String>,
    },

    /// Service answered with a non-success status
    #[error("Service returned HTTP {status}: {error}")]
    Service { status: u16, error: ErrorDetail },

    /// Operation reached the `Failed` state
    #[error("Operation failed: {0}")]
    OperationFailed(ErrorDetail),

    /// Poll loop exceeded its deadline or attempt budget
    #[error("Operation timed out {0}")]
    Timeout(TimeoutKind),

    /// Poll loop was cancelled by the caller
    #[error("Operation polling was cancelled")]
    Cancelled,
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub(crate) fn transport(context: impl Into<String>, source: reqwest::Error) -> Self {
        CoreError::Transport {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn protocol(message: impl Into<String>, body: Option<String>) -> Self {
        CoreError::Protocol {
            message: message.into(),
            body,
        }
    }

    /// Returns true if this is a "not found" error (404)
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::Service { status: 404, .. })
    }

    /// Returns true if this is an authentication/authorization error (401/403)
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, CoreError::Service { status: 401 | 403, .. })
    }

    /// Returns true if this is a server error (5xx)
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, CoreError::Service { status, .. } if *status >= 500)
    }

    /// Returns true for network level failures
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, CoreError::Transport { .. })
    }

    /// Returns true if either the poll loop bound or the HTTP request timed out
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            CoreError::Timeout(_) => true,
            CoreError::Transport { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    #[must_use]
    pub fn is_operation_failed(&self) -> bool {
        matches!(self, CoreError::OperationFailed(_))
    }

    /// Error detail tree carried by service and operation failures
    pub fn error_detail(&self) -> Option<&ErrorDetail> {
        match self {
            CoreError::Service { error, .. } | CoreError::OperationFailed(error) => Some(error),
            _ => None,
        }
    }
}
