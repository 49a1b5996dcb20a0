//! Unit tests for the instance controller.


use std::time::Duration;

use rstest::{fixture, rstest};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::backend::{ApiError, InstanceStatus};
use crate::instance::{Credentials, InstanceFile};
use crate::test_support::{ManualClock, ScriptedProvisioningApi};

const ID: &str = "db-instance-1";

const DEFINITION: &str = r"
instance:
  opts:
    AllocatedStorage: 20
    AutoMinorVersionUpgrade: true
    BackupRetentionPeriod: 0
    DBInstanceClass: db.t3.micro
    DBInstanceIdentifier: db-instance-1
    DBName: appdb
    DBParameterGroup: ''
    DBSubnetGroupName: ''
    DeletionProtection: false
    Engine: postgres
    EngineVersion: '16.3'
    LicenseModel: postgresql-license
    PubliclyAccessible: false
    SkipFinalSnapshot: true
  creds:
    secret_name: rds/psql
";

pub(super) fn policy() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_secs(30),
        timeout: Duration::from_secs(20 * 60),
        describe_retries: 2,
    }
}

pub(super) fn desired() -> DesiredInstance {
    let file = InstanceFile::parse(DEFINITION)
        .unwrap_or_else(|err| panic!("definition should parse: {err}"));
    DesiredInstance::assemble(file.options().clone(), Credentials::new("admin", "p@ss"))
}

pub(super) struct Harness {
    pub(super) api: ScriptedProvisioningApi,
    pub(super) clock: ManualClock,
    pub(super) controller: InstanceController<ScriptedProvisioningApi, ManualClock>,
}

#[fixture]
pub(super) fn harness() -> Harness {
    let api = ScriptedProvisioningApi::new();
    let clock = ManualClock::new();
    let controller = InstanceController::new(api.clone())
        .with_clock(clock.clone())
        .with_policy(policy());
    Harness {
        api,
        clock,
        controller,
    }
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(5)]
#[tokio::test]
async fn create_succeeds_after_observing_available(harness: Harness, #[case] pending: usize) {
    harness.api.push_statuses(ID, "creating", pending);
    harness.api.push_status(ID, "available");

    let outcome = harness
        .controller
        .create_instance(&desired(), &CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("create should succeed: {err}"));

    assert_eq!(outcome.identifier, ID);
    assert_eq!(
        outcome.arn,
        Some(format!("arn:aws:rds:eu-west-1:123456789012:db:{ID}"))
    );
    assert_eq!(harness.api.create_calls(), 1);
    assert_eq!(harness.api.describe_calls(), pending + 1);
    assert_eq!(harness.clock.sleeps().len(), pending);
    assert_eq!(outcome.elapsed, harness.clock.slept());
}

#[rstest]
#[tokio::test]
async fn rejected_create_never_polls(harness: Harness) {
    harness.api.reject_create(ApiError::Rejected {
        code: String::from("DBInstanceAlreadyExists"),
        message: String::from("already exists"),
    });

    let err = harness
        .controller
        .create_instance(&desired(), &CancellationToken::new())
        .await
        .expect_err("create should fail");

    assert!(matches!(err, ControllerError::Create { .. }), "unexpected error: {err}");
    assert_eq!(err.operation(), Operation::Create);
    assert_eq!(harness.api.describe_calls(), 0);
    assert!(harness.clock.sleeps().is_empty());
}

#[rstest]
#[tokio::test]
async fn create_times_out_when_instance_stays_creating(harness: Harness) {
    harness.api.push_status(ID, "creating");

    let err = harness
        .controller
        .create_instance(&desired(), &CancellationToken::new())
        .await
        .expect_err("create should time out");

    let ControllerError::Timeout {
        operation,
        waited,
        last_status,
        ..
    } = err
    else {
        panic!("expected timeout, got {err}");
    };
    assert_eq!(operation, Operation::Create);
    assert_eq!(waited, policy().timeout);
    assert_eq!(last_status, Some(InstanceStatus::new("creating")));
    // 20 minutes at 30 seconds: 40 sleeps and one describe after each, plus
    // the first.
    assert_eq!(harness.api.describe_calls(), 41);
}

#[rstest]
#[case("failed")]
#[case("incompatible-parameters")]
#[case("inaccessible-encryption-credentials")]
#[tokio::test]
async fn create_aborts_on_failure_status(harness: Harness, #[case] status: &str) {
    harness.api.push_status(ID, "creating");
    harness.api.push_status(ID, status);

    let err = harness
        .controller
        .create_instance(&desired(), &CancellationToken::new())
        .await
        .expect_err("create should fail");

    assert_eq!(
        err,
        ControllerError::FailedState {
            operation: Operation::Create,
            identifier: String::from(ID),
            status: InstanceStatus::new(status),
        }
    );
    assert_eq!(harness.api.describe_calls(), 2);
}

#[rstest]
#[tokio::test]
async fn create_keeps_polling_while_instance_is_not_yet_visible(harness: Harness) {
    harness.api.push_not_found(ID);
    harness.api.push_describe(Ok(Vec::new()));
    harness.api.push_status(ID, "available");

    let outcome = harness
        .controller
        .create_instance(&desired(), &CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("create should succeed: {err}"));

    assert_eq!(outcome.identifier, ID);
    assert_eq!(harness.api.describe_calls(), 3);
}

#[rstest]
#[tokio::test]
async fn delete_succeeds_on_not_found(harness: Harness) {
    harness.api.push_statuses(ID, "deleting", 3);
    harness.api.push_not_found(ID);

    let outcome = harness
        .controller
        .delete_instance(&desired(), &CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("delete should succeed: {err}"));

    assert_eq!(outcome.identifier, ID);
    assert_eq!(harness.api.describe_calls(), 4);
    let requests = harness.api.delete_requests();
    assert_eq!(requests.len(), 1);
    assert!(requests.iter().all(|request| request.skip_final_snapshot));
}

#[rstest]
#[tokio::test]
async fn delete_treats_empty_listing_as_gone(harness: Harness) {
    harness.api.push_status(ID, "deleting");
    harness.api.push_describe(Ok(Vec::new()));

    harness
        .controller
        .delete_instance(&desired(), &CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("delete should succeed: {err}"));

    assert_eq!(harness.api.describe_calls(), 2);
}

#[rstest]
#[tokio::test]
async fn delete_never_mistakes_describe_errors_for_success(harness: Harness) {
    harness.api.push_status(ID, "deleting");
    harness.api.push_describe(Err(ApiError::Rejected {
        code: String::from("AccessDenied"),
        message: String::from("denied"),
    }));

    let err = harness
        .controller
        .delete_instance(&desired(), &CancellationToken::new())
        .await
        .expect_err("describe failure must not read as deleted");

    assert!(matches!(err, ControllerError::Describe { .. }), "unexpected error: {err}");
}

#[rstest]
#[tokio::test]
async fn delete_aborts_when_instance_is_not_being_deleted(harness: Harness) {
    harness.api.push_status(ID, "modifying");

    let err = harness
        .controller
        .delete_instance(&desired(), &CancellationToken::new())
        .await
        .expect_err("delete should fail");

    assert!(
        matches!(err, ControllerError::FailedState { operation: Operation::Delete, .. }),
        "unexpected error: {err}"
    );
}

#[rstest]
#[tokio::test]
async fn delete_without_snapshot_name_is_refused_locally(harness: Harness) {
    let base = desired();
    let mut options = base.options().clone();
    options.skip_final_snapshot = false;
    let target = DesiredInstance::assemble(options, base.credentials().clone());

    let err = harness
        .controller
        .delete_instance(&target, &CancellationToken::new())
        .await
        .expect_err("missing snapshot name");

    assert!(
        matches!(err, ControllerError::Delete { source: ApiError::Invalid(_), .. }),
        "unexpected error: {err}"
    );
    assert!(harness.api.delete_requests().is_empty());
}

#[rstest]
#[tokio::test]
async fn rejected_delete_never_polls(harness: Harness) {
    harness.api.reject_delete(ApiError::Rejected {
        code: String::from("InvalidDBInstanceState"),
        message: String::from("protected"),
    });

    let err = harness
        .controller
        .delete_instance(&desired(), &CancellationToken::new())
        .await
        .expect_err("delete should fail");

    assert!(matches!(err, ControllerError::Delete { .. }), "unexpected error: {err}");
    assert_eq!(harness.api.describe_calls(), 0);
}

#[rstest]
#[tokio::test]
async fn describe_maps_not_found_to_empty_listing(harness: Harness) {
    harness.api.push_not_found(ID);

    let states = harness
        .controller
        .describe_instances(&DescribeQuery::by_identifier(ID), &CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("describe should succeed: {err}"));

    assert!(states.is_empty());
}

#[rstest]
#[tokio::test]
async fn describe_surfaces_provider_errors(harness: Harness) {
    harness.api.push_describe(Err(ApiError::Transport {
        message: String::from("connection reset"),
    }));

    let err = harness
        .controller
        .describe_instances(&DescribeQuery::all(), &CancellationToken::new())
        .await
        .expect_err("describe should fail");

    assert_eq!(err.operation(), Operation::Describe);
}

#[rstest]
#[tokio::test]
async fn cancelled_token_stops_before_any_request(harness: Harness) {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = harness
        .controller
        .create_instance(&desired(), &cancel)
        .await
        .expect_err("create should be cancelled");

    assert_eq!(
        err,
        ControllerError::Cancelled {
            operation: Operation::Create,
            identifier: String::from(ID),
        }
    );
    assert_eq!(harness.api.create_calls(), 0);
}

/// Clock that trips a cancellation token on a chosen sleep, standing in for
/// a Ctrl-C arriving while the controller waits between polls.
struct InterruptingClock {
    inner: ManualClock,
    cancel: CancellationToken,
    trip_on_sleep: usize,
}

impl Clock for InterruptingClock {
    fn now(&self) -> std::time::Instant {
        self.inner.now()
    }

    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        if self.inner.sleeps().len() + 1 >= self.trip_on_sleep {
            self.cancel.cancel();
        }
        self.inner.sleep(duration)
    }
}

#[tokio::test]
async fn cancellation_during_wait_is_not_a_timeout() {
    let api = ScriptedProvisioningApi::new();
    api.push_status(ID, "creating");
    let cancel = CancellationToken::new();
    let controller = InstanceController::new(api.clone())
        .with_clock(InterruptingClock {
            inner: ManualClock::new(),
            cancel: cancel.clone(),
            trip_on_sleep: 2,
        })
        .with_policy(policy());

    let err = controller
        .create_instance(&desired(), &cancel)
        .await
        .expect_err("create should be cancelled mid-wait");

    assert_eq!(
        err,
        ControllerError::Cancelled {
            operation: Operation::Create,
            identifier: String::from(ID),
        }
    );
    assert_eq!(api.create_calls(), 1);
    assert_eq!(api.describe_calls(), 2);
}

#[rstest]
#[tokio::test]
async fn unschedulable_wait_budget_is_refused_before_any_request(harness: Harness) {
    let controller = harness.controller.with_policy(PollPolicy {
        timeout: Duration::from_secs(u64::MAX),
        ..policy()
    });
    harness.api.push_status(ID, "available");

    let create = controller
        .create_instance(&desired(), &CancellationToken::new())
        .await
        .expect_err("create should refuse the budget");
    let delete = controller
        .delete_instance(&desired(), &CancellationToken::new())
        .await
        .expect_err("delete should refuse the budget");

    assert!(matches!(create, ControllerError::WaitBudget { operation: Operation::Create, .. }));
    assert!(matches!(delete, ControllerError::WaitBudget { operation: Operation::Delete, .. }));
    assert_eq!(harness.api.create_calls(), 0);
    assert!(harness.api.delete_requests().is_empty());
    assert_eq!(harness.api.describe_calls(), 0);
}

#[rstest]
#[tokio::test]
async fn create_without_reported_arn_still_succeeds(harness: Harness) {
    harness
        .api
        .accept_create_with(RemoteInstanceState::new(ID, "creating"));
    harness
        .api
        .push_describe(Ok(vec![RemoteInstanceState::new(ID, "available")]));

    let outcome = harness
        .controller
        .create_instance(&desired(), &CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("create should succeed: {err}"));

    assert_eq!(outcome.identifier, ID);
    assert_eq!(outcome.arn, None);
}

#[rstest]
#[tokio::test]
async fn create_falls_back_to_arn_from_accepted_request(harness: Harness) {
    harness
        .api
        .push_describe(Ok(vec![RemoteInstanceState::new(ID, "available")]));

    let outcome = harness
        .controller
        .create_instance(&desired(), &CancellationToken::new())
        .await
        .unwrap_or_else(|err| panic!("create should succeed: {err}"));

    assert_eq!(
        outcome.arn,
        Some(format!("arn:aws:rds:eu-west-1:123456789012:db:{ID}"))
    );
}
