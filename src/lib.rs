//! Core library for the `rdsctl` provisioning tool.
//!
//! The crate loads an instance definition, resolves master credentials from
//! AWS Secrets Manager, and drives an Amazon RDS instance through create or
//! delete, polling until the remote instance reaches a terminal state.
//! Provider access sits behind the [`ProvisioningApi`] and [`SecretStore`]
//! traits so the whole flow can run against the doubles in
//! [`test_support`].

pub mod backend;
pub mod config;
pub mod controller;
pub mod instance;
pub mod rds;
pub mod report;
pub mod run;
pub mod secrets;
pub mod test_support;

pub use backend::{
    ApiError, BackendFuture, DeleteInstanceRequest, DescribeQuery, InstanceEndpoint,
    InstanceStatus, ProvisioningApi, RemoteInstanceState, StatusPhase,
};
pub use config::{AppConfig, ConfigError};
pub use controller::{
    Clock, ControllerError, CreateOutcome, DeleteOutcome, InstanceController, Operation,
    PollPolicy, SystemClock,
};
pub use instance::{Credentials, DesiredInstance, InstanceFile, InstanceOptions};
pub use rds::RdsBackend;
pub use run::{ProvisionOrchestrator, RunError};
pub use secrets::{
    DecodeError, SecretError, SecretResolver, SecretStore, SecretStoreError, SecretsManagerStore,
};
