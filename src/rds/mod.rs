//! Amazon RDS implementation of [`ProvisioningApi`].

mod convert;
mod error;

use aws_sdk_rds::Client;
use tracing::debug;

use crate::backend::{
    ApiError, BackendFuture, DeleteInstanceRequest, DescribeQuery, ProvisioningApi,
    RemoteInstanceState,
};
use crate::instance::DesiredInstance;
use convert::remote_state;
use error::classify;

/// Provisioning backend over an `aws-sdk-rds` client.
#[derive(Clone, Debug)]
pub struct RdsBackend {
    client: Client,
}

impl RdsBackend {
    /// Wraps an already configured client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Drops blank optional strings so the provider applies its own default.
fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

impl ProvisioningApi for RdsBackend {
    fn create_instance<'a>(
        &'a self,
        desired: &'a DesiredInstance,
    ) -> BackendFuture<'a, RemoteInstanceState, ApiError> {
        Box::pin(async move {
            let opts = desired.options();
            let identifier = desired.identifier();
            let log_exports = (!opts.enable_cloudwatch_logs_exports.is_empty())
                .then(|| opts.enable_cloudwatch_logs_exports.clone());

            let output = self
                .client
                .create_db_instance()
                .db_instance_identifier(identifier)
                .db_instance_class(opts.db_instance_class.trim())
                .engine(opts.engine.trim())
                .allocated_storage(opts.allocated_storage)
                .auto_minor_version_upgrade(opts.auto_minor_version_upgrade)
                .backup_retention_period(opts.backup_retention_period)
                .deletion_protection(opts.deletion_protection)
                .publicly_accessible(opts.publicly_accessible)
                .set_db_name(non_blank(&opts.db_name))
                .set_db_parameter_group_name(non_blank(&opts.db_parameter_group))
                .set_db_subnet_group_name(non_blank(&opts.db_subnet_group_name))
                .set_engine_version(non_blank(&opts.engine_version))
                .set_license_model(non_blank(&opts.license_model))
                .set_enable_cloudwatch_logs_exports(log_exports)
                .master_username(desired.credentials().username())
                .master_user_password(desired.credentials().password())
                .send()
                .await
                .map_err(|err| classify(&err, identifier))?;

            Ok(output.db_instance().map_or_else(
                || RemoteInstanceState::new(identifier, "creating"),
                |instance| remote_state(instance, identifier),
            ))
        })
    }

    fn describe_instances<'a>(
        &'a self,
        query: &'a DescribeQuery,
    ) -> BackendFuture<'a, Vec<RemoteInstanceState>, ApiError> {
        Box::pin(async move {
            let scope = query.identifier.as_deref().unwrap_or_default();
            let mut states = Vec::new();
            let mut marker: Option<String> = None;
            loop {
                let output = self
                    .client
                    .describe_db_instances()
                    .set_db_instance_identifier(query.identifier.clone())
                    .set_max_records(query.max_records)
                    .set_marker(marker.take())
                    .send()
                    .await
                    .map_err(|err| classify(&err, scope))?;

                states.extend(
                    output
                        .db_instances()
                        .iter()
                        .map(|instance| remote_state(instance, scope)),
                );
                match output.marker() {
                    Some(next) if !next.is_empty() => marker = Some(next.to_owned()),
                    _ => break,
                }
                debug!(fetched = states.len(), "fetching next describe page");
            }
            Ok(states)
        })
    }

    fn delete_instance<'a>(
        &'a self,
        request: &'a DeleteInstanceRequest,
    ) -> BackendFuture<'a, RemoteInstanceState, ApiError> {
        Box::pin(async move {
            let output = self
                .client
                .delete_db_instance()
                .db_instance_identifier(&request.identifier)
                .skip_final_snapshot(request.skip_final_snapshot)
                .set_final_db_snapshot_identifier(request.final_snapshot_identifier.clone())
                .send()
                .await
                .map_err(|err| classify(&err, &request.identifier))?;

            Ok(output.db_instance().map_or_else(
                || RemoteInstanceState::new(request.identifier.as_str(), "deleting"),
                |instance| remote_state(instance, &request.identifier),
            ))
        })
    }
}
