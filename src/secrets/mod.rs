//! Master credential resolution from a secrets vault.
//!
//! The vault holds a JSON document in the shape written by the RDS console's
//! "credentials for RDS database" secret type. Only the user name and
//! password flow onwards; the remaining keys are decoded for completeness.

mod aws;

use std::fmt;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::backend::BackendFuture;
use crate::instance::Credentials;

pub use aws::SecretsManagerStore;

/// Version stage that always points at the active secret value.
pub const CURRENT_VERSION_STAGE: &str = "AWSCURRENT";

/// Failures reported by a secret store implementation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SecretStoreError {
    /// The secret (or the requested version) does not exist.
    #[error("secret not found")]
    NotFound,
    /// The caller may not read the secret.
    #[error("access denied: {message}")]
    AccessDenied {
        /// Provider error message.
        message: String,
    },
    /// The secret exists but carries no string payload.
    #[error("secret has no string payload")]
    EmptyPayload,
    /// The store could not be reached.
    #[error("secret store unreachable: {message}")]
    Unreachable {
        /// Description of the transport failure.
        message: String,
    },
    /// Any other provider failure.
    #[error("secret store error ({code}): {message}")]
    Service {
        /// Provider error code.
        code: String,
        /// Provider error message.
        message: String,
    },
}

/// Minimal interface to a secrets vault.
pub trait SecretStore: Send + Sync {
    /// Fetches the string payload of `secret_id` at `version_stage`.
    fn secret_string<'a>(
        &'a self,
        secret_id: &'a str,
        version_stage: &'a str,
    ) -> BackendFuture<'a, String, SecretStoreError>;
}

/// Errors raised while resolving master credentials.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SecretError {
    /// Fetching the secret failed.
    #[error("failed to fetch secret {secret_name}: {source}")]
    Fetch {
        /// Name of the secret.
        secret_name: String,
        /// Underlying store failure.
        #[source]
        source: SecretStoreError,
    },
    /// The payload is not a usable credentials document.
    #[error("failed to decode secret {secret_name}: {source}")]
    Decode {
        /// Name of the secret.
        secret_name: String,
        /// Reason the payload was refused.
        #[source]
        source: DecodeError,
    },
}

/// Reasons a credentials payload is refused. None of them carry payload
/// text.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DecodeError {
    /// The payload is not JSON of the expected shape.
    #[error("payload is not a credentials document (line {line}, column {column})")]
    Malformed {
        /// Line of the first offending token.
        line: usize,
        /// Column of the first offending token.
        column: usize,
    },
    /// The user name is blank.
    #[error("username must not be empty")]
    BlankUsername,
    /// The password is empty.
    #[error("password must not be empty")]
    EmptyPassword,
}

/// Decoded credentials document.
#[derive(Clone, Deserialize, Eq, PartialEq, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSecret {
    /// Master user name.
    pub username: String,
    /// Master password.
    pub password: String,
    /// Engine recorded alongside the credentials.
    #[serde(default)]
    pub engine: Option<String>,
    /// Host recorded alongside the credentials.
    #[serde(default)]
    pub host: Option<String>,
    /// Port recorded alongside the credentials.
    #[serde(default)]
    pub port: Option<u16>,
    /// Database name recorded alongside the credentials.
    #[serde(default)]
    pub dbname: Option<String>,
    /// Instance identifier recorded alongside the credentials.
    #[serde(default)]
    pub db_instance_identifier: Option<String>,
}

impl fmt::Debug for DatabaseSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSecret")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("db_instance_identifier", &self.db_instance_identifier)
            .finish()
    }
}

impl DatabaseSecret {
    /// Returns the master credentials carried by the document.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.as_str(), self.password.as_str())
    }
}

/// Decodes a credentials payload.
///
/// # Errors
///
/// Returns [`DecodeError::Malformed`] for invalid JSON and the blank-field
/// variants for an unusable user name or password.
pub fn decode_secret(payload: &str) -> Result<DatabaseSecret, DecodeError> {
    let secret: DatabaseSecret =
        serde_json::from_str(payload).map_err(|err| DecodeError::Malformed {
            line: err.line(),
            column: err.column(),
        })?;
    if secret.username.trim().is_empty() {
        return Err(DecodeError::BlankUsername);
    }
    if secret.password.is_empty() {
        return Err(DecodeError::EmptyPassword);
    }
    Ok(secret)
}

/// Fetches and decodes master credentials from a [`SecretStore`].
#[derive(Clone, Debug)]
pub struct SecretResolver<S> {
    store: S,
}

impl<S: SecretStore> SecretResolver<S> {
    /// Wraps a secret store.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Resolves the current credentials stored under `secret_name`.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::Fetch`] when the store fails and
    /// [`SecretError::Decode`] when the payload is unusable.
    pub async fn resolve(&self, secret_name: &str) -> Result<Credentials, SecretError> {
        debug!(secret_name, "fetching master credentials");
        let payload = Zeroizing::new(
            self.store
                .secret_string(secret_name, CURRENT_VERSION_STAGE)
                .await
                .map_err(|source| SecretError::Fetch {
                    secret_name: secret_name.to_owned(),
                    source,
                })?,
        );
        let secret = decode_secret(&payload).map_err(|source| SecretError::Decode {
            secret_name: secret_name.to_owned(),
            source,
        })?;
        Ok(secret.credentials())
    }
}
