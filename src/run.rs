//! Orchestrates a single provisioning run.
//!
//! A run resolves the master credentials, combines them with the loaded
//! instance options, and hands the result to the controller. Splitting this
//! out of the entry point lets the whole flow run against test doubles.

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::backend::{DescribeQuery, ProvisioningApi, RemoteInstanceState};
use crate::controller::{
    Clock, ControllerError, CreateOutcome, DeleteOutcome, InstanceController, SystemClock,
};
use crate::instance::{DesiredInstance, InstanceOptions};
use crate::secrets::{SecretError, SecretResolver, SecretStore};

/// Errors surfaced while performing a provisioning run.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum RunError {
    /// Raised when the master credentials cannot be resolved.
    #[error(transparent)]
    Secret(#[from] SecretError),
    /// Raised when the controller fails.
    #[error(transparent)]
    Controller(#[from] ControllerError),
    /// Raised when the run is cancelled before the controller takes over.
    #[error("run cancelled while {stage}")]
    Cancelled {
        /// Step that was interrupted.
        stage: &'static str,
    },
}

/// Sequences secret resolution, assembly, and the controller.
#[derive(Debug)]
pub struct ProvisionOrchestrator<P, S, C = SystemClock> {
    controller: InstanceController<P, C>,
    resolver: SecretResolver<S>,
}

impl<P, S, C> ProvisionOrchestrator<P, S, C>
where
    P: ProvisioningApi,
    S: SecretStore,
    C: Clock,
{
    /// Creates a new orchestrator.
    #[must_use]
    pub const fn new(controller: InstanceController<P, C>, resolver: SecretResolver<S>) -> Self {
        Self {
            controller,
            resolver,
        }
    }

    /// Resolves credentials and creates the instance.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Secret`] before any provisioning call when the
    /// credentials cannot be resolved, and [`RunError::Controller`] when the
    /// create or its wait fails.
    pub async fn create(
        &self,
        options: &InstanceOptions,
        secret_name: &str,
        cancel: &CancellationToken,
    ) -> Result<CreateOutcome, RunError> {
        let desired = self.assemble(options, secret_name, cancel).await?;
        Ok(self.controller.create_instance(&desired, cancel).await?)
    }

    /// Resolves credentials and deletes the instance.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`ProvisionOrchestrator::create`].
    pub async fn delete(
        &self,
        options: &InstanceOptions,
        secret_name: &str,
        cancel: &CancellationToken,
    ) -> Result<DeleteOutcome, RunError> {
        let desired = self.assemble(options, secret_name, cancel).await?;
        Ok(self.controller.delete_instance(&desired, cancel).await?)
    }

    /// Lists instances. No credentials are needed.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Controller`] when the describe fails.
    pub async fn describe(
        &self,
        query: &DescribeQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteInstanceState>, RunError> {
        Ok(self.controller.describe_instances(query, cancel).await?)
    }

    async fn assemble(
        &self,
        options: &InstanceOptions,
        secret_name: &str,
        cancel: &CancellationToken,
    ) -> Result<DesiredInstance, RunError> {
        let credentials = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(RunError::Cancelled {
                    stage: "resolving credentials",
                });
            }
            resolved = self.resolver.resolve(secret_name) => resolved?,
        };
        Ok(DesiredInstance::assemble(options.clone(), credentials))
    }
}
