//! BDD step definitions for the create and delete lifecycle.

use rdsctl::ApiError;
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use super::test_helpers::{FailureKind, LifecycleContext, LifecycleResult};
use crate::test_constants::{INSTANCE_ID, SECRET_PAYLOAD};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("master credentials stored under \"{name}\"")]
fn credentials_stored(mut lifecycle_context: LifecycleContext, name: String) -> LifecycleContext {
    lifecycle_context.store = lifecycle_context
        .store
        .with_secret(&name, SECRET_PAYLOAD);
    lifecycle_context.secret_name = name;
    lifecycle_context
}

#[given("a malformed secret stored under \"{name}\"")]
fn malformed_secret(mut lifecycle_context: LifecycleContext, name: String) -> LifecycleContext {
    lifecycle_context.store = lifecycle_context
        .store
        .with_secret(&name, "{\"user\":\"admin\"}");
    lifecycle_context.secret_name = name;
    lifecycle_context
}

#[given("no secret is stored")]
fn no_secret(lifecycle_context: LifecycleContext) -> LifecycleContext {
    lifecycle_context
}

#[given("the instance reports \"{status}\" for \"{count}\" polls before becoming available")]
fn becomes_available(
    lifecycle_context: LifecycleContext,
    status: String,
    count: usize,
) -> LifecycleContext {
    lifecycle_context
        .api
        .push_statuses(INSTANCE_ID, &status, count);
    lifecycle_context.api.push_status(INSTANCE_ID, "available");
    lifecycle_context
}

#[given("the instance reports \"{status}\" for \"{count}\" polls before entering \"{failure}\"")]
fn enters_failure(
    lifecycle_context: LifecycleContext,
    status: String,
    count: usize,
    failure: String,
) -> LifecycleContext {
    lifecycle_context
        .api
        .push_statuses(INSTANCE_ID, &status, count);
    lifecycle_context.api.push_status(INSTANCE_ID, &failure);
    lifecycle_context
}

#[given("the instance reports \"{status}\" for \"{count}\" polls before disappearing")]
fn disappears(lifecycle_context: LifecycleContext, status: String, count: usize) -> LifecycleContext {
    lifecycle_context
        .api
        .push_statuses(INSTANCE_ID, &status, count);
    lifecycle_context.api.push_not_found(INSTANCE_ID);
    lifecycle_context
}

#[given("the instance stays \"{status}\"")]
fn stays(lifecycle_context: LifecycleContext, status: String) -> LifecycleContext {
    lifecycle_context.api.push_status(INSTANCE_ID, &status);
    lifecycle_context
}

#[given("the provider rejects the create request")]
fn create_rejected(lifecycle_context: LifecycleContext) -> LifecycleContext {
    lifecycle_context.api.reject_create(ApiError::Rejected {
        code: String::from("DBInstanceAlreadyExists"),
        message: String::from("DB instance already exists"),
    });
    lifecycle_context
}

#[given("status checks are denied after the delete is accepted")]
fn describe_denied(lifecycle_context: LifecycleContext) -> LifecycleContext {
    lifecycle_context.api.push_describe(Err(ApiError::Rejected {
        code: String::from("AccessDenied"),
        message: String::from("not authorised to perform rds:DescribeDBInstances"),
    }));
    lifecycle_context
}

#[when("I create the instance")]
fn create_instance(mut lifecycle_context: LifecycleContext) -> Result<LifecycleContext, StepError> {
    let runtime = Runtime::new()?;
    let orchestrator = lifecycle_context.orchestrator();
    let result = runtime.block_on(orchestrator.create(
        &lifecycle_context.options,
        &lifecycle_context.secret_name,
        &CancellationToken::new(),
    ));
    lifecycle_context.outcome = Some(LifecycleResult::from_run(result, LifecycleResult::Created));
    Ok(lifecycle_context)
}

#[when("I delete the instance")]
fn delete_instance(mut lifecycle_context: LifecycleContext) -> Result<LifecycleContext, StepError> {
    let runtime = Runtime::new()?;
    let orchestrator = lifecycle_context.orchestrator();
    let result = runtime.block_on(orchestrator.delete(
        &lifecycle_context.options,
        &lifecycle_context.secret_name,
        &CancellationToken::new(),
    ));
    lifecycle_context.outcome = Some(LifecycleResult::from_run(result, LifecycleResult::Deleted));
    Ok(lifecycle_context)
}

fn expect_status_checks(lifecycle_context: &LifecycleContext, checks: usize) -> Result<(), StepError> {
    let seen = lifecycle_context.api.describe_calls();
    if seen != checks {
        return Err(StepError::Assertion(format!(
            "expected {checks} status checks, saw {seen}"
        )));
    }
    Ok(())
}

#[then("the create succeeds after \"{checks}\" status checks")]
fn create_succeeds(lifecycle_context: &LifecycleContext, checks: usize) -> Result<(), StepError> {
    match &lifecycle_context.outcome {
        Some(LifecycleResult::Created(outcome)) if outcome.identifier == INSTANCE_ID => {
            expect_status_checks(lifecycle_context, checks)
        }
        other => Err(StepError::Assertion(format!(
            "expected a completed create, got {other:?}"
        ))),
    }
}

#[then("the reported ARN names the instance")]
fn arn_names_instance(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    match &lifecycle_context.outcome {
        Some(LifecycleResult::Created(outcome))
            if outcome
                .arn
                .as_deref()
                .is_some_and(|arn| arn.ends_with(&format!(":db:{INSTANCE_ID}"))) =>
        {
            Ok(())
        }
        other => Err(StepError::Assertion(format!(
            "expected an ARN for {INSTANCE_ID}, got {other:?}"
        ))),
    }
}

#[then("the delete succeeds after \"{checks}\" status checks")]
fn delete_succeeds(lifecycle_context: &LifecycleContext, checks: usize) -> Result<(), StepError> {
    match &lifecycle_context.outcome {
        Some(LifecycleResult::Deleted(outcome)) if outcome.identifier == INSTANCE_ID => {
            expect_status_checks(lifecycle_context, checks)
        }
        other => Err(StepError::Assertion(format!(
            "expected a completed delete, got {other:?}"
        ))),
    }
}

#[then("the run fails with a \"{kind}\" error")]
fn run_fails(lifecycle_context: &LifecycleContext, kind: String) -> Result<(), StepError> {
    let expected = FailureKind::parse(&kind)
        .ok_or_else(|| StepError::Assertion(format!("unknown failure kind {kind}")))?;
    match &lifecycle_context.outcome {
        Some(LifecycleResult::Failed(failure)) if failure.kind == expected => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a {kind} failure, got {other:?}"
        ))),
    }
}

#[then("no status checks were made")]
fn no_status_checks(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    expect_status_checks(lifecycle_context, 0)
}

#[then("no provisioning request was sent")]
fn no_provisioning(lifecycle_context: &LifecycleContext) -> Result<(), StepError> {
    let api = &lifecycle_context.api;
    if api.create_calls() != 0 || !api.delete_requests().is_empty() {
        return Err(StepError::Assertion(String::from(
            "provisioning request sent despite a secret failure",
        )));
    }
    expect_status_checks(lifecycle_context, 0)
}
