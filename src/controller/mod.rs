//! Instance controller: issues lifecycle requests and waits for the remote
//! instance to reach a terminal state.
//!
//! Every mutating call is followed by a bounded poll loop. Each remote call
//! and each sleep races the caller's [`CancellationToken`], so an interrupt
//! surfaces as [`ControllerError::Cancelled`] rather than a timeout.

mod clock;
mod error;
mod wait;

use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::backend::{
    ApiError, DeleteInstanceRequest, DescribeQuery, InstanceEndpoint, ProvisioningApi,
    RemoteInstanceState,
};
use crate::instance::DesiredInstance;
use wait::{cancellable, observe_create, observe_delete};

pub use clock::{Clock, SleepFuture, SystemClock};
pub use error::ControllerError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(20 * 60);
const DEFAULT_DESCRIBE_RETRIES: u32 = 3;

/// Polling cadence and budget.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollPolicy {
    /// Pause between describe calls.
    pub interval: Duration,
    /// Total time allowed for the remote transition.
    pub timeout: Duration,
    /// Consecutive transient describe failures tolerated.
    pub describe_retries: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_WAIT_TIMEOUT,
            describe_retries: DEFAULT_DESCRIBE_RETRIES,
        }
    }
}

/// Lifecycle operation driven by the controller.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operation {
    /// Instance creation.
    Create,
    /// Instance deletion.
    Delete,
    /// Read-only listing.
    Describe,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Describe => "describe",
        })
    }
}

/// Result of a completed create.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateOutcome {
    /// Instance identifier.
    pub identifier: String,
    /// Amazon Resource Name of the new instance, when the provider
    /// reported one.
    pub arn: Option<String>,
    /// Connection endpoint, when already published.
    pub endpoint: Option<InstanceEndpoint>,
    /// Time from sending the request to observing `available`.
    pub elapsed: Duration,
}

/// Result of a completed delete.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeleteOutcome {
    /// Instance identifier.
    pub identifier: String,
    /// Time from sending the request to the instance disappearing.
    pub elapsed: Duration,
}

/// Drives create, delete, and describe against a [`ProvisioningApi`].
#[derive(Clone, Debug)]
pub struct InstanceController<P, C = SystemClock> {
    api: P,
    clock: C,
    policy: PollPolicy,
}

impl<P: ProvisioningApi> InstanceController<P> {
    /// Creates a controller using the wall clock and default policy.
    #[must_use]
    pub fn new(api: P) -> Self {
        Self {
            api,
            clock: SystemClock,
            policy: PollPolicy::default(),
        }
    }
}

impl<P, C> InstanceController<P, C> {
    /// Replaces the time source.
    #[must_use]
    pub fn with_clock<D: Clock>(self, clock: D) -> InstanceController<P, D> {
        InstanceController {
            api: self.api,
            clock,
            policy: self.policy,
        }
    }

    /// Replaces the polling policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the active polling policy.
    #[must_use]
    pub const fn policy(&self) -> PollPolicy {
        self.policy
    }
}

impl<P: ProvisioningApi, C: Clock> InstanceController<P, C> {
    /// Creates the instance and waits until it is `available`.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Create`] when the request is refused (no
    /// polling happens), [`ControllerError::FailedState`] when the instance
    /// enters a failure status, [`ControllerError::Describe`] when status
    /// checks keep failing, [`ControllerError::Timeout`] when the budget runs
    /// out, and [`ControllerError::Cancelled`] on cancellation. A budget too
    /// large to schedule yields [`ControllerError::WaitBudget`] before the
    /// request is sent.
    #[instrument(skip_all, fields(identifier = %desired.identifier()))]
    pub async fn create_instance(
        &self,
        desired: &DesiredInstance,
        cancel: &CancellationToken,
    ) -> Result<CreateOutcome, ControllerError> {
        let identifier = desired.identifier();
        let started = self.clock.now();
        self.deadline_from(Operation::Create, identifier, started)?;
        let accepted = cancellable(cancel, self.api.create_instance(desired))
            .await
            .ok_or_else(|| ControllerError::Cancelled {
                operation: Operation::Create,
                identifier: identifier.to_owned(),
            })?
            .map_err(|source| ControllerError::Create {
                identifier: identifier.to_owned(),
                source,
            })?;
        info!(status = %accepted.status, "create request accepted");

        let available = self
            .poll_until(Operation::Create, identifier, cancel, observe_create)
            .await?;
        let arn = available.arn.or(accepted.arn);
        let elapsed = self.clock.now().saturating_duration_since(started);
        info!(arn = arn.as_deref().unwrap_or("unknown"), ?elapsed, "instance available");
        Ok(CreateOutcome {
            identifier: available.identifier,
            arn,
            endpoint: available.endpoint,
            elapsed,
        })
    }

    /// Deletes the instance and waits until the provider no longer reports
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Delete`] when the request cannot be built
    /// or is refused, and the same wait errors as
    /// [`InstanceController::create_instance`].
    #[instrument(skip_all, fields(identifier = %desired.identifier()))]
    pub async fn delete_instance(
        &self,
        desired: &DesiredInstance,
        cancel: &CancellationToken,
    ) -> Result<DeleteOutcome, ControllerError> {
        let identifier = desired.identifier();
        let delete_error = |source: ApiError| ControllerError::Delete {
            identifier: identifier.to_owned(),
            source,
        };
        let request = DeleteInstanceRequest::from_options(desired.options()).map_err(delete_error)?;
        let started = self.clock.now();
        self.deadline_from(Operation::Delete, identifier, started)?;
        let accepted = cancellable(cancel, self.api.delete_instance(&request))
            .await
            .ok_or_else(|| ControllerError::Cancelled {
                operation: Operation::Delete,
                identifier: identifier.to_owned(),
            })?
            .map_err(delete_error)?;
        info!(status = %accepted.status, "delete request accepted");

        self.poll_until(Operation::Delete, identifier, cancel, observe_delete)
            .await?;
        let elapsed = self.clock.now().saturating_duration_since(started);
        info!(?elapsed, "instance deleted");
        Ok(DeleteOutcome {
            identifier: identifier.to_owned(),
            elapsed,
        })
    }

    /// Lists instances matching `query`. A miss on an identifier-scoped query
    /// yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Describe`] on provider failure and
    /// [`ControllerError::Cancelled`] on cancellation.
    #[instrument(skip_all, fields(identifier = query.identifier.as_deref().unwrap_or("*")))]
    pub async fn describe_instances(
        &self,
        query: &DescribeQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteInstanceState>, ControllerError> {
        let identifier = query.identifier.clone().unwrap_or_default();
        let response = cancellable(cancel, self.api.describe_instances(query))
            .await
            .ok_or_else(|| ControllerError::Cancelled {
                operation: Operation::Describe,
                identifier: identifier.clone(),
            })?;
        match response {
            Ok(states) => Ok(states),
            Err(ApiError::NotFound { .. }) => Ok(Vec::new()),
            Err(source) => Err(ControllerError::Describe { identifier, source }),
        }
    }
}

#[cfg(test)]
mod tests;
