//! Conversion from SDK instance records into [`RemoteInstanceState`].

use aws_sdk_rds::primitives::DateTimeFormat;
use aws_sdk_rds::types::DbInstance;

use crate::backend::{InstanceEndpoint, RemoteInstanceState};

/// Status reported when the provider omits one.
const UNKNOWN_STATUS: &str = "unknown";

pub(super) fn remote_state(instance: &DbInstance, fallback_identifier: &str) -> RemoteInstanceState {
    let identifier = instance
        .db_instance_identifier()
        .unwrap_or(fallback_identifier);
    let status = instance.db_instance_status().unwrap_or(UNKNOWN_STATUS);
    let mut state = RemoteInstanceState::new(identifier, status);

    state.arn = owned(instance.db_instance_arn());
    state.engine = owned(instance.engine());
    state.engine_version = owned(instance.engine_version());
    state.instance_class = owned(instance.db_instance_class());
    state.allocated_storage = instance.allocated_storage();
    state.db_name = owned(instance.db_name());
    state.endpoint = instance.endpoint().and_then(|endpoint| {
        endpoint.address().map(|address| InstanceEndpoint {
            address: address.to_owned(),
            port: endpoint.port().and_then(|port| u16::try_from(port).ok()),
        })
    });
    state.availability_zone = owned(instance.availability_zone());
    state.multi_az = instance.multi_az();
    state.master_username = owned(instance.master_username());
    state.backup_retention_period = instance.backup_retention_period();
    state.auto_minor_version_upgrade = instance.auto_minor_version_upgrade();
    state.parameter_group = instance
        .db_parameter_groups()
        .first()
        .and_then(|group| owned(group.db_parameter_group_name()));
    state.subnet_group = instance
        .db_subnet_group()
        .and_then(|group| owned(group.db_subnet_group_name()));
    state.created_at = instance
        .instance_create_time()
        .and_then(|time| time.fmt(DateTimeFormat::DateTime).ok());
    state
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_owned)
}
