//! Instance definition and the desired state handed to the controller.

mod options;

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

pub use options::{CredentialsReference, InstanceFile, InstanceOptions, InstanceSection};

/// Master credentials for a new instance.
///
/// The password is wiped from memory on drop and never printed.
#[derive(Clone, Eq, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates credentials from a user name and password.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the master user name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the master password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Options plus resolved credentials: everything a create or delete needs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DesiredInstance {
    options: InstanceOptions,
    credentials: Credentials,
}

impl DesiredInstance {
    /// Combines loaded options with resolved credentials.
    #[must_use]
    pub const fn assemble(options: InstanceOptions, credentials: Credentials) -> Self {
        Self {
            options,
            credentials,
        }
    }

    /// Returns the instance options.
    #[must_use]
    pub const fn options(&self) -> &InstanceOptions {
        &self.options
    }

    /// Returns the master credentials.
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns the instance identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.options.db_instance_identifier
    }
}
