//! YAML schema of the instance definition document.

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Creation and deletion parameters of a single database instance.
///
/// Keys mirror the provider's API field names so existing definition files
/// can be reused unchanged.
#[expect(
    clippy::struct_excessive_bools,
    reason = "each flag maps one-to-one onto a provider request field"
)]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceOptions {
    /// Storage to allocate, in gigabytes.
    #[serde(rename = "AllocatedStorage")]
    pub allocated_storage: i32,
    /// Apply minor engine upgrades automatically.
    #[serde(rename = "AutoMinorVersionUpgrade")]
    pub auto_minor_version_upgrade: bool,
    /// Days to retain automated backups. Zero disables them.
    #[serde(rename = "BackupRetentionPeriod")]
    pub backup_retention_period: i32,
    /// Compute class, for example `db.t3.micro`.
    #[serde(rename = "DBInstanceClass")]
    pub db_instance_class: String,
    /// Unique instance identifier; create and delete are keyed on it.
    #[serde(rename = "DBInstanceIdentifier")]
    pub db_instance_identifier: String,
    /// Name of the database created with the instance.
    #[serde(rename = "DBName")]
    pub db_name: String,
    /// Parameter group applied to the instance.
    #[serde(rename = "DBParameterGroup")]
    pub db_parameter_group: String,
    /// Subnet group the instance is placed in.
    #[serde(rename = "DBSubnetGroupName")]
    pub db_subnet_group_name: String,
    /// Refuse deletion while set.
    #[serde(rename = "DeletionProtection")]
    pub deletion_protection: bool,
    /// Log types exported to `CloudWatch`.
    #[serde(rename = "EnableCloudwatchLogsExports", default)]
    pub enable_cloudwatch_logs_exports: Vec<String>,
    /// Database engine, for example `postgres`.
    #[serde(rename = "Engine")]
    pub engine: String,
    /// Engine version.
    #[serde(rename = "EngineVersion")]
    pub engine_version: String,
    /// License model.
    #[serde(rename = "LicenseModel")]
    pub license_model: String,
    /// Assign a publicly resolvable endpoint.
    #[serde(rename = "PubliclyAccessible")]
    pub publicly_accessible: bool,
    /// Skip the final snapshot on delete.
    #[serde(rename = "SkipFinalSnapshot", default)]
    pub skip_final_snapshot: bool,
    /// Snapshot name used when a final snapshot is taken on delete.
    #[serde(
        rename = "FinalDBSnapshotIdentifier",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub final_db_snapshot_identifier: Option<String>,
}

/// Where the master credentials live.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsReference {
    /// Name or ARN of the secret holding the master credentials.
    pub secret_name: String,
}

/// The `instance` section: options plus a credentials reference.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceSection {
    /// Instance parameters.
    pub opts: InstanceOptions,
    /// Credentials reference.
    pub creds: CredentialsReference,
}

/// Top-level instance definition document.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceFile {
    /// The single instance described by the document.
    pub instance: InstanceSection,
}

impl InstanceFile {
    /// Reads and validates an instance definition from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read and the
    /// errors of [`InstanceFile::parse`] otherwise.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = read_document(path)?;
        Self::parse(&contents)
    }

    /// Parses and validates an instance definition.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed YAML or a missing key and
    /// [`ConfigError::MissingField`] / [`ConfigError::Invalid`] for values
    /// the provider would refuse.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let file: Self =
            serde_yaml::from_str(contents).map_err(|err| ConfigError::Parse(err.to_string()))?;
        file.validate()?;
        Ok(file)
    }

    /// Renders the document back to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if serialisation fails.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Returns the instance options.
    #[must_use]
    pub const fn options(&self) -> &InstanceOptions {
        &self.instance.opts
    }

    /// Returns the configured secret name.
    #[must_use]
    pub fn secret_name(&self) -> &str {
        self.instance.creds.secret_name.trim()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let opts = &self.instance.opts;
        require("instance.opts.DBInstanceIdentifier", &opts.db_instance_identifier)?;
        require("instance.opts.DBInstanceClass", &opts.db_instance_class)?;
        require("instance.opts.Engine", &opts.engine)?;
        require("instance.creds.secret_name", &self.instance.creds.secret_name)?;
        if opts.allocated_storage <= 0 {
            return Err(ConfigError::Invalid(String::from(
                "instance.opts.AllocatedStorage must be greater than zero",
            )));
        }
        if opts.backup_retention_period < 0 {
            return Err(ConfigError::Invalid(String::from(
                "instance.opts.BackupRetentionPeriod must not be negative",
            )));
        }
        Ok(())
    }
}

fn require(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField(format!("{key} must not be empty")));
    }
    Ok(())
}

fn read_document(path: &Utf8Path) -> Result<String, ConfigError> {
    let read_error = |message: String| ConfigError::Read {
        path: path.to_string(),
        message,
    };
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| read_error(String::from("path is missing a file name")))?;

    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|err| read_error(err.to_string()))?;
    dir.read_to_string(file_name)
        .map_err(|err| read_error(err.to_string()))
}
