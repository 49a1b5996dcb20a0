//! Deadline-bounded polling shared by the create and delete waits.

use std::future::Future;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::clock::Clock;
use super::{ControllerError, InstanceController, Operation};
use crate::backend::{
    ApiError, DescribeQuery, InstanceStatus, ProvisioningApi, RemoteInstanceState, StatusPhase,
};

/// What a single describe response means for the awaited transition.
#[derive(Debug, Eq, PartialEq)]
pub(super) enum Observation<T> {
    /// The transition completed.
    Settled(T),
    /// Still transitioning; carries the observed status when one was seen.
    Pending(Option<InstanceStatus>),
    /// The transition cannot complete.
    Failed(InstanceStatus),
}

type DescribeResult = Result<Vec<RemoteInstanceState>, ApiError>;

/// Interprets a describe response while waiting for `available`.
///
/// A miss right after acceptance means the instance is not visible yet.
pub(super) fn observe_create(
    identifier: &str,
    response: DescribeResult,
) -> Result<Observation<RemoteInstanceState>, ApiError> {
    match response {
        Ok(states) => Ok(
            match states
                .into_iter()
                .find(|state| state.identifier.eq_ignore_ascii_case(identifier))
            {
                None => Observation::Pending(None),
                Some(state) => match state.status.create_phase() {
                    StatusPhase::Settled => Observation::Settled(state),
                    StatusPhase::Pending => Observation::Pending(Some(state.status)),
                    StatusPhase::Failed => Observation::Failed(state.status),
                },
            },
        ),
        Err(ApiError::NotFound { .. }) => Ok(Observation::Pending(None)),
        Err(err) => Err(err),
    }
}

/// Interprets a describe response while waiting for the instance to vanish.
///
/// Only a not-found signal settles; describe errors never do.
pub(super) fn observe_delete(
    identifier: &str,
    response: DescribeResult,
) -> Result<Observation<()>, ApiError> {
    match response {
        Ok(states) => Ok(
            match states
                .into_iter()
                .find(|state| state.identifier.eq_ignore_ascii_case(identifier))
            {
                None => Observation::Settled(()),
                Some(state) => match state.status.delete_phase() {
                    StatusPhase::Failed => Observation::Failed(state.status),
                    StatusPhase::Settled | StatusPhase::Pending => {
                        Observation::Pending(Some(state.status))
                    }
                },
            },
        ),
        Err(ApiError::NotFound { .. }) => Ok(Observation::Settled(())),
        Err(err) => Err(err),
    }
}

/// Runs `future` unless `cancel` fires first.
pub(super) async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    future: F,
) -> Option<F::Output> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        output = future => Some(output),
    }
}

impl<P: ProvisioningApi, C: Clock> InstanceController<P, C> {
    /// Returns the instant the wait budget runs out when starting at `from`.
    pub(super) fn deadline_from(
        &self,
        operation: Operation,
        identifier: &str,
        from: Instant,
    ) -> Result<Instant, ControllerError> {
        from.checked_add(self.policy.timeout)
            .ok_or_else(|| ControllerError::WaitBudget {
                operation,
                identifier: identifier.to_owned(),
                timeout: self.policy.timeout,
            })
    }

    /// Describes `identifier` every poll interval until `observe` settles,
    /// fails, or the wait budget runs out.
    pub(super) async fn poll_until<T>(
        &self,
        operation: Operation,
        identifier: &str,
        cancel: &CancellationToken,
        observe: fn(&str, DescribeResult) -> Result<Observation<T>, ApiError>,
    ) -> Result<T, ControllerError> {
        let started = self.clock.now();
        let deadline = self.deadline_from(operation, identifier, started)?;
        let query = DescribeQuery::by_identifier(identifier);
        let cancelled = || ControllerError::Cancelled {
            operation,
            identifier: identifier.to_owned(),
        };
        let mut last_status: Option<InstanceStatus> = None;
        let mut consecutive_failures: u32 = 0;
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);
            let response = cancellable(cancel, self.api.describe_instances(&query))
                .await
                .ok_or_else(cancelled)?;

            match observe(identifier, response) {
                Ok(Observation::Settled(value)) => {
                    debug!(attempt, "{operation} settled");
                    return Ok(value);
                }
                Ok(Observation::Failed(status)) => {
                    return Err(ControllerError::FailedState {
                        operation,
                        identifier: identifier.to_owned(),
                        status,
                    });
                }
                Ok(Observation::Pending(status)) => {
                    consecutive_failures = 0;
                    debug!(
                        attempt,
                        status = status.as_ref().map_or("not visible", InstanceStatus::as_str),
                        "{operation} pending"
                    );
                    if status.is_some() {
                        last_status = status;
                    }
                }
                Err(err)
                    if err.is_transient() && consecutive_failures < self.policy.describe_retries =>
                {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    debug!(attempt, consecutive_failures, error = %err, "describe failed, retrying");
                }
                Err(source) => {
                    return Err(ControllerError::Describe {
                        identifier: identifier.to_owned(),
                        source,
                    });
                }
            }

            let now = self.clock.now();
            if now >= deadline {
                return Err(ControllerError::Timeout {
                    operation,
                    identifier: identifier.to_owned(),
                    waited: now.saturating_duration_since(started),
                    last_status,
                });
            }
            let pause = self
                .policy
                .interval
                .min(deadline.saturating_duration_since(now));
            cancellable(cancel, self.clock.sleep(pause))
                .await
                .ok_or_else(cancelled)?;
        }
    }
}
