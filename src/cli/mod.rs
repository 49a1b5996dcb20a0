//! Command-line interface definitions for the `rdsctl` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `rdsctl` binary.
#[derive(Debug, Parser)]
#[command(
    name = "rdsctl",
    version,
    about = "Provision, describe, and tear down an Amazon RDS instance from a YAML definition"
)]
pub(crate) struct Cli {
    /// Instance definition YAML document (defaults to cfg/instance_config.yaml).
    #[arg(long, short = 'c', global = true, value_name = "PATH")]
    pub(crate) config: Option<String>,
    /// Secrets Manager secret holding the master credentials.
    ///
    /// Overrides `instance.creds.secret_name` from the definition document.
    #[arg(long, global = true, value_name = "NAME")]
    pub(crate) secret_name: Option<String>,
    /// Operation to perform. Defaults to `create`.
    #[command(subcommand)]
    pub(crate) command: Option<Command>,
}

/// Operations supported by `rdsctl`.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Create the instance and wait until it is available.
    #[command(name = "create")]
    Create,
    /// Delete the instance and wait until it is gone.
    #[command(name = "delete")]
    Delete,
    /// Show the current state of instances.
    #[command(name = "describe")]
    Describe(DescribeCommand),
}

/// Arguments for the `rdsctl describe` subcommand.
#[derive(Debug, Args)]
pub(crate) struct DescribeCommand {
    /// Describe this instance instead of the configured one.
    #[arg(long, value_name = "ID", conflicts_with = "all")]
    pub(crate) identifier: Option<String>,
    /// Describe every instance in the region.
    #[arg(long)]
    pub(crate) all: bool,
}
