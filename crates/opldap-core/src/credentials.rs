//! Bind credentials for the directory service account.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

/// Service account used to bind before searching.
///
/// The password is kept in a [`SecretString`] so it is redacted from `Debug` output and log
/// fields.
#[derive(Debug, Deserialize)]
pub struct BindCredentials {
    /// Bind DN (e.g. `CN=svc-ldap,OU=Service,DC=example,DC=com`)
    pub bind_dn: String,

    /// Bind password
    #[serde(deserialize_with = "deserialize_secret")]
    bind_password: SecretString,
}

impl BindCredentials {
    /// Create new bind credentials.
    #[must_use]
    pub fn new(bind_dn: impl Into<String>, bind_password: impl Into<String>) -> Self {
        Self {
            bind_dn: bind_dn.into(),
            bind_password: SecretString::from(bind_password.into()),
        }
    }

    /// Get the LDAP bind DN.
    #[must_use]
    pub fn bind_dn(&self) -> &str {
        &self.bind_dn
    }

    /// Get the LDAP bind password.
    #[must_use]
    pub fn bind_password(&self) -> &str {
        self.bind_password.expose_secret()
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}
