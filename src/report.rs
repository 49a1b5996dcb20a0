//! Plain-text rendering of run outcomes for standard output.

use crate::backend::RemoteInstanceState;
use crate::controller::{CreateOutcome, DeleteOutcome};

/// Renders the outcome of a completed create.
#[must_use]
pub fn render_created(outcome: &CreateOutcome) -> String {
    let mut lines = vec![
        format!("Created instance {}", outcome.identifier),
        format!("  Elapsed: {:.1?}", outcome.elapsed),
        format!("  ARN: {}", outcome.arn.as_deref().unwrap_or("unknown")),
    ];
    if let Some(endpoint) = &outcome.endpoint {
        lines.push(format!("  Endpoint: {endpoint}"));
    }
    lines.join("\n")
}

/// Renders the outcome of a completed delete.
#[must_use]
pub fn render_deleted(outcome: &DeleteOutcome) -> String {
    format!(
        "Deleted instance {}\n  Elapsed: {:.1?}",
        outcome.identifier, outcome.elapsed
    )
}

/// Renders a describe listing, one block per instance.
#[must_use]
pub fn render_instances(states: &[RemoteInstanceState]) -> String {
    if states.is_empty() {
        return String::from("No instances found");
    }
    states
        .iter()
        .map(render_instance)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_instance(state: &RemoteInstanceState) -> String {
    let mut lines = vec![
        format!("Instance: {}", state.identifier),
        format!("  Status: {}", state.status),
    ];
    let mut field = |label: &str, value: Option<String>| {
        if let Some(present) = value {
            lines.push(format!("  {label}: {present}"));
        }
    };
    field("ARN", state.arn.clone());
    field(
        "Engine",
        state.engine.as_ref().map(|engine| {
            state
                .engine_version
                .as_ref()
                .map_or_else(|| engine.clone(), |version| format!("{engine} {version}"))
        }),
    );
    field("Class", state.instance_class.clone());
    field(
        "Storage",
        state.allocated_storage.map(|size| format!("{size} GiB")),
    );
    field("Database", state.db_name.clone());
    field(
        "Endpoint",
        state.endpoint.as_ref().map(ToString::to_string),
    );
    field("Availability zone", state.availability_zone.clone());
    field("Multi-AZ", state.multi_az.map(|flag| flag.to_string()));
    field("Master user", state.master_username.clone());
    field(
        "Backup retention",
        state
            .backup_retention_period
            .map(|days| format!("{days} days")),
    );
    field(
        "Auto minor upgrade",
        state.auto_minor_version_upgrade.map(|flag| flag.to_string()),
    );
    field("Parameter group", state.parameter_group.clone());
    field("Subnet group", state.subnet_group.clone());
    field("Created", state.created_at.clone());
    lines.join("\n")
}
