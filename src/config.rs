//! Application settings loaded via `ortho-config`.
//!
//! These settings describe how the tool talks to AWS and how long it waits;
//! the database instance itself is described by the YAML document loaded in
//! [`crate::instance`].

use std::time::Duration;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::controller::PollPolicy;

/// Default location of the instance definition document.
pub const DEFAULT_INSTANCE_CONFIG: &str = "cfg/instance_config.yaml";

const MAX_WAIT_TIMEOUT_SECS: u64 = 24 * 60 * 60;
const MIN_DESCRIBE_RECORDS: i32 = 20;
const MAX_DESCRIBE_RECORDS: i32 = 100;

/// Settings derived from defaults, `rdsctl.toml`, and `RDSCTL_*`
/// environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "RDSCTL",
    discovery(
        app_name = "rdsctl",
        env_var = "RDSCTL_CONFIG_PATH",
        config_file_name = "rdsctl.toml",
        dotfile_name = ".rdsctl.toml",
        project_file_name = "rdsctl.toml"
    )
)]
pub struct AppConfig {
    /// Path to the instance definition YAML document.
    #[ortho_config(default = DEFAULT_INSTANCE_CONFIG.to_owned())]
    pub instance_config: String,
    /// Secret name overriding `instance.creds.secret_name`.
    pub secret_name: Option<String>,
    /// AWS region. Falls back to the SDK's default provider chain.
    pub region: Option<String>,
    /// Endpoint override, mainly for local AWS emulators.
    pub endpoint_url: Option<String>,
    /// Seconds between describe calls while waiting.
    #[ortho_config(default = 30)]
    pub poll_interval_secs: u64,
    /// Seconds to wait for a terminal state before giving up.
    #[ortho_config(default = 1200)]
    pub wait_timeout_secs: u64,
    /// Consecutive transient describe failures tolerated while waiting.
    #[ortho_config(default = 3)]
    pub describe_retries: u32,
    /// Page size for the describe command.
    #[ortho_config(default = 20)]
    pub describe_max_records: i32,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn invalid(&self, requirement: &str) -> ConfigError {
        ConfigError::Invalid(format!(
            "{} {requirement}: set {} or {} in rdsctl.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

impl AppConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to rdsctl.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    fn require_optional(value: Option<&str>, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        value.map_or(Ok(()), |present| Self::require_field(present, metadata))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("rdsctl")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and TOML key that provide each value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] for blank values and
    /// [`ConfigError::Invalid`] for out-of-range numbers, including a wait
    /// timeout above one day.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.instance_config,
            &FieldMetadata::new(
                "instance definition path",
                "RDSCTL_INSTANCE_CONFIG",
                "instance_config",
            ),
        )?;
        Self::require_optional(
            self.secret_name.as_deref(),
            &FieldMetadata::new("secret name", "RDSCTL_SECRET_NAME", "secret_name"),
        )?;
        Self::require_optional(
            self.region.as_deref(),
            &FieldMetadata::new("AWS region", "RDSCTL_REGION", "region"),
        )?;
        Self::require_optional(
            self.endpoint_url.as_deref(),
            &FieldMetadata::new("endpoint URL", "RDSCTL_ENDPOINT_URL", "endpoint_url"),
        )?;
        if self.poll_interval_secs == 0 {
            return Err(FieldMetadata::new(
                "poll interval",
                "RDSCTL_POLL_INTERVAL_SECS",
                "poll_interval_secs",
            )
            .invalid("must be at least one second"));
        }
        if !(1..=MAX_WAIT_TIMEOUT_SECS).contains(&self.wait_timeout_secs) {
            return Err(FieldMetadata::new(
                "wait timeout",
                "RDSCTL_WAIT_TIMEOUT_SECS",
                "wait_timeout_secs",
            )
            .invalid("must be between 1 and 86400 seconds"));
        }
        if !(MIN_DESCRIBE_RECORDS..=MAX_DESCRIBE_RECORDS).contains(&self.describe_max_records) {
            return Err(FieldMetadata::new(
                "describe page size",
                "RDSCTL_DESCRIBE_MAX_RECORDS",
                "describe_max_records",
            )
            .invalid("must be between 20 and 100"));
        }
        Ok(())
    }

    /// Returns the instance definition path.
    #[must_use]
    pub fn instance_config_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(self.instance_config.trim())
    }

    /// Returns the polling cadence and budget used by the controller.
    #[must_use]
    pub const fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll_interval_secs),
            timeout: Duration::from_secs(self.wait_timeout_secs),
            describe_retries: self.describe_retries,
        }
    }

    /// Loads the shared AWS SDK configuration, applying the region and
    /// endpoint overrides when present.
    pub async fn sdk_config(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.trim().to_owned()));
        }
        if let Some(endpoint) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint.trim());
        }
        loader.load().await
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader or the YAML parser.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// Raised when a configuration file cannot be read.
    #[error("failed to read {path}: {message}")]
    Read {
        /// Path that could not be read.
        path: String,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when a value is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
