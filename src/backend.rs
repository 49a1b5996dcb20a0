//! Provisioning API abstraction for managed database instances.
//!
//! The controller only ever talks to the provider through
//! [`ProvisioningApi`], which exposes the three call shapes the tool needs:
//! create, describe, and delete. Provider failures are normalised into
//! [`ApiError`] so wait loops can tell a missing instance apart from a
//! transient transport failure.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::instance::{DesiredInstance, InstanceOptions};

/// Future returned by provisioning and secret store operations.
pub type BackendFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Lifecycle status string reported by the provider (for example
/// `creating` or `available`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceStatus(String);

/// How an observed status reads from the point of view of a wait loop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StatusPhase {
    /// The awaited state has been reached.
    Settled,
    /// The instance is still transitioning.
    Pending,
    /// The instance reached a state the awaited transition cannot recover
    /// from.
    Failed,
}

const STATUS_AVAILABLE: &str = "available";
const CREATE_FAILURE_STATUSES: &[&str] = &[
    "failed",
    "deleting",
    "deleted",
    "inaccessible-encryption-credentials",
];
const DELETE_FAILURE_STATUSES: &[&str] = &[
    "failed",
    "creating",
    "modifying",
    "rebooting",
    "resetting-master-credentials",
];

impl InstanceStatus {
    /// Wraps a provider status string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw status string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Classifies the status while waiting for a new instance to become
    /// available.
    #[must_use]
    pub fn create_phase(&self) -> StatusPhase {
        let status = self.as_str();
        if status == STATUS_AVAILABLE {
            StatusPhase::Settled
        } else if CREATE_FAILURE_STATUSES.contains(&status) || status.starts_with("incompatible-")
        {
            StatusPhase::Failed
        } else {
            StatusPhase::Pending
        }
    }

    /// Classifies the status while waiting for an instance to disappear.
    ///
    /// Deletion only settles once the provider stops reporting the instance,
    /// so no status maps to [`StatusPhase::Settled`].
    #[must_use]
    pub fn delete_phase(&self) -> StatusPhase {
        if DELETE_FAILURE_STATUSES.contains(&self.as_str()) {
            StatusPhase::Failed
        } else {
            StatusPhase::Pending
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for InstanceStatus {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Network endpoint assigned to an instance once it is reachable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceEndpoint {
    /// DNS name of the instance.
    pub address: String,
    /// TCP port the engine listens on.
    pub port: Option<u16>,
}

impl fmt::Display for InstanceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{port}", self.address),
            None => f.write_str(&self.address),
        }
    }
}

/// The provider's read-only view of a database instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteInstanceState {
    /// Instance identifier.
    pub identifier: String,
    /// Current lifecycle status.
    pub status: InstanceStatus,
    /// Amazon Resource Name assigned by the provider.
    pub arn: Option<String>,
    /// Database engine name.
    pub engine: Option<String>,
    /// Database engine version.
    pub engine_version: Option<String>,
    /// Compute class of the instance.
    pub instance_class: Option<String>,
    /// Allocated storage in gigabytes.
    pub allocated_storage: Option<i32>,
    /// Name of the initial database.
    pub db_name: Option<String>,
    /// Connection endpoint, present once the instance is reachable.
    pub endpoint: Option<InstanceEndpoint>,
    /// Availability zone hosting the instance.
    pub availability_zone: Option<String>,
    /// Whether the instance is deployed across availability zones.
    pub multi_az: Option<bool>,
    /// Master user name.
    pub master_username: Option<String>,
    /// Days automated backups are retained.
    pub backup_retention_period: Option<i32>,
    /// Whether minor engine upgrades are applied automatically.
    pub auto_minor_version_upgrade: Option<bool>,
    /// Name of the first attached parameter group.
    pub parameter_group: Option<String>,
    /// Name of the subnet group.
    pub subnet_group: Option<String>,
    /// Creation timestamp in RFC 3339 form.
    pub created_at: Option<String>,
}

impl RemoteInstanceState {
    /// Creates a state carrying only an identifier and status.
    #[must_use]
    pub fn new(identifier: impl Into<String>, status: impl Into<InstanceStatus>) -> Self {
        Self {
            identifier: identifier.into(),
            status: status.into(),
            arn: None,
            engine: None,
            engine_version: None,
            instance_class: None,
            allocated_storage: None,
            db_name: None,
            endpoint: None,
            availability_zone: None,
            multi_az: None,
            master_username: None,
            backup_retention_period: None,
            auto_minor_version_upgrade: None,
            parameter_group: None,
            subnet_group: None,
            created_at: None,
        }
    }
}

/// Selection criteria for a describe call.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DescribeQuery {
    /// Restricts the result to a single instance identifier.
    pub identifier: Option<String>,
    /// Page size requested from the provider.
    pub max_records: Option<i32>,
}

impl DescribeQuery {
    /// Describes every instance visible to the caller.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Describes a single instance by identifier.
    #[must_use]
    pub fn by_identifier(identifier: impl Into<String>) -> Self {
        Self {
            identifier: Some(identifier.into()),
            max_records: None,
        }
    }

    /// Sets the provider page size.
    #[must_use]
    pub const fn with_max_records(mut self, max_records: i32) -> Self {
        self.max_records = Some(max_records);
        self
    }
}

/// Parameters of a delete call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeleteInstanceRequest {
    /// Identifier of the instance to delete.
    pub identifier: String,
    /// Whether to skip the final snapshot.
    pub skip_final_snapshot: bool,
    /// Snapshot name used when a final snapshot is taken.
    pub final_snapshot_identifier: Option<String>,
}

impl DeleteInstanceRequest {
    /// Builds a delete request from loaded instance options.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] when a final snapshot is requested
    /// without a snapshot identifier, since the provider would reject it.
    pub fn from_options(options: &InstanceOptions) -> Result<Self, ApiError> {
        let final_snapshot_identifier = options
            .final_db_snapshot_identifier
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned);
        if !options.skip_final_snapshot && final_snapshot_identifier.is_none() {
            return Err(ApiError::Invalid(String::from(
                "FinalDBSnapshotIdentifier is required when SkipFinalSnapshot is false",
            )));
        }
        Ok(Self {
            identifier: options.db_instance_identifier.clone(),
            skip_final_snapshot: options.skip_final_snapshot,
            final_snapshot_identifier,
        })
    }
}

/// Errors raised by provisioning API implementations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ApiError {
    /// The provider does not know the instance.
    #[error("instance {identifier} not found")]
    NotFound {
        /// Identifier that was looked up.
        identifier: String,
    },
    /// The provider refused the request (validation, quota, duplicate
    /// identifier, access denied).
    #[error("request rejected ({code}): {message}")]
    Rejected {
        /// Provider error code.
        code: String,
        /// Provider error message.
        message: String,
    },
    /// The provider asked the caller to slow down.
    #[error("request throttled: {message}")]
    Throttled {
        /// Provider error message.
        message: String,
    },
    /// The request never produced a provider response.
    #[error("transport failure: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },
    /// The request could not be built locally.
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl ApiError {
    /// Returns `true` when repeating the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Throttled { .. } | Self::Transport { .. })
    }
}

/// Minimal interface implemented by database provisioning backends.
pub trait ProvisioningApi: Send + Sync {
    /// Requests creation of the desired instance and returns the provider's
    /// view of the accepted instance.
    fn create_instance<'a>(
        &'a self,
        desired: &'a DesiredInstance,
    ) -> BackendFuture<'a, RemoteInstanceState, ApiError>;

    /// Lists instances matching the query. Implementations return
    /// [`ApiError::NotFound`] when an identifier-scoped lookup misses.
    fn describe_instances<'a>(
        &'a self,
        query: &'a DescribeQuery,
    ) -> BackendFuture<'a, Vec<RemoteInstanceState>, ApiError>;

    /// Requests deletion of an instance.
    fn delete_instance<'a>(
        &'a self,
        request: &'a DeleteInstanceRequest,
    ) -> BackendFuture<'a, RemoteInstanceState, ApiError>;
}
