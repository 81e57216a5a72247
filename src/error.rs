//! Error types for the sportfeed client.
//!
//! One error enum covers both halves of the crate: the live feed core and
//! the REST helpers. Transport-family errors are recovered via reconnection
//! unless a fail-fast entry point was used; `BadInput` and `AlreadyDisposed`
//! are never retried.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for live-feed and REST operations.
///
/// # Examples
///
/// ```
/// use sportfeed::FeedError;
///
/// let error = FeedError::Transport {
///     reason: "connection refused".to_string(),
/// };
/// assert!(error.is_recoverable());
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedError {
    /// An argument failed eager validation.
    #[error("[Feed] Invalid input '{name}': {reason}")]
    BadInput {
        /// Name of the offending parameter.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A connect, send, or receive operation failed.
    #[error("[Feed] Transport failure: {reason}")]
    Transport {
        /// Reason for the transport failure.
        reason: String,
    },

    /// An operation timed out.
    #[error("[Feed] Timeout after {timeout_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// An HTTP request failed.
    #[error("[Feed] HTTP error: status {status} - {reason}")]
    Http {
        /// HTTP status code (0 when no response was received).
        status: u16,
        /// Reason for the HTTP error.
        reason: String,
    },

    /// A payload could not be decoded.
    #[error("[Feed] Decode error: {reason}")]
    Decode {
        /// Reason for the decode failure.
        reason: String,
    },

    /// The client was disposed; no further operations are possible.
    #[error("[Feed] Client is already disposed")]
    AlreadyDisposed,

    /// The operation was canceled during teardown or reconnection.
    #[error("[Feed] Operation canceled")]
    Canceled,
}

impl FeedError {
    /// Creates a `BadInput` error for the named parameter.
    #[must_use]
    pub fn bad_input(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadInput {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Transport` error with the given reason.
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Returns true if this error is recoverable through reconnection.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } | Self::Canceled => true,
            Self::Http { status, .. } => *status >= 500,
            Self::BadInput { .. } | Self::Decode { .. } | Self::AlreadyDisposed => false,
        }
    }

    /// Returns true if this error belongs to the transport-fault family.
    #[must_use]
    pub fn is_transport_fault(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Timeout { .. } | Self::Http { .. }
        )
    }
}
