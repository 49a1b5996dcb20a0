//! Error types for the instance controller.

use std::time::Duration;

use thiserror::Error;

use super::Operation;
use crate::backend::{ApiError, InstanceStatus};

/// Errors raised while driving an instance through a lifecycle transition.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ControllerError {
    /// The provider refused the create request; nothing was polled.
    #[error("create request for {identifier} failed: {source}")]
    Create {
        /// Instance identifier.
        identifier: String,
        /// Provider failure.
        #[source]
        source: ApiError,
    },
    /// The provider refused the delete request; nothing was polled.
    #[error("delete request for {identifier} failed: {source}")]
    Delete {
        /// Instance identifier.
        identifier: String,
        /// Provider failure.
        #[source]
        source: ApiError,
    },
    /// A describe call failed permanently or too many times in a row.
    #[error("describe for {identifier} failed: {source}")]
    Describe {
        /// Instance identifier, empty for unscoped listings.
        identifier: String,
        /// Provider failure.
        #[source]
        source: ApiError,
    },
    /// The instance entered a status the transition cannot recover from.
    #[error("{operation} of {identifier} failed: instance entered status {status}")]
    FailedState {
        /// Operation in progress.
        operation: Operation,
        /// Instance identifier.
        identifier: String,
        /// Offending status.
        status: InstanceStatus,
    },
    /// The wait budget ran out. The remote outcome is unknown.
    #[error(
        "timed out after {waited:?} waiting for {operation} of {identifier} (last status: {})",
        .last_status.as_ref().map_or("unknown", InstanceStatus::as_str)
    )]
    Timeout {
        /// Operation in progress.
        operation: Operation,
        /// Instance identifier.
        identifier: String,
        /// Time spent waiting since the request was accepted.
        waited: Duration,
        /// Last status observed, if any.
        last_status: Option<InstanceStatus>,
    },
    /// The run was cancelled. The remote outcome is unknown.
    #[error("{operation} of {identifier} cancelled")]
    Cancelled {
        /// Operation in progress.
        operation: Operation,
        /// Instance identifier.
        identifier: String,
    },
    /// The wait budget cannot be represented as a deadline. Raised before
    /// any request is sent.
    #[error("wait timeout {timeout:?} for {operation} of {identifier} is out of range")]
    WaitBudget {
        /// Operation that was about to start.
        operation: Operation,
        /// Instance identifier.
        identifier: String,
        /// Configured wait budget.
        timeout: Duration,
    },
}

impl ControllerError {
    /// Returns the operation the error belongs to.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Create { .. } => Operation::Create,
            Self::Delete { .. } => Operation::Delete,
            Self::Describe { .. } => Operation::Describe,
            Self::FailedState { operation, .. }
            | Self::Timeout { operation, .. }
            | Self::Cancelled { operation, .. }
            | Self::WaitBudget { operation, .. } => *operation,
        }
    }
}
