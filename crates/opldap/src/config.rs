//! Configuration types for the directory client.

use crate::{dn::DistinguishedName, filter::PLACEHOLDER, Result};
use opldap_core::{BindCredentials, Error, TlsSettings};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;
use validator::{Validate, ValidationError};

/// Default LDAP port.
pub const DEFAULT_PORT: u16 = 389;
/// Default connection timeout (seconds).
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;
/// Default operation timeout (seconds).
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 10;
/// Default group filter template.
pub const DEFAULT_GROUP_FILTER: &str = "(memberUid=%s)";
/// Default user filter template.
pub const DEFAULT_USER_FILTER: &str = "(uid=%s)";

/// Connection and search parameters for a [`DirectoryClient`](crate::DirectoryClient).
///
/// Build it with [`DirectoryConfig::new`] and the `with_*` methods, or deserialize it from JSON
/// with [`DirectoryConfig::from_json_str`]. The bind DN and password sit at the top level of the
/// JSON document.
#[derive(Debug, Deserialize, Validate)]
pub struct DirectoryConfig {
    #[validate(length(min = 1))]
    host: String,
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    port: u16,
    #[serde(flatten)]
    credentials: BindCredentials,
    #[validate(custom(function = "validate_base_dn"))]
    base_dn: String,
    #[serde(default = "default_attributes")]
    attributes: Vec<String>,
    #[serde(default = "default_group_filter")]
    #[validate(custom(function = "validate_filter_template"))]
    group_filter: String,
    #[serde(default = "default_user_filter")]
    #[validate(custom(function = "validate_filter_template"))]
    user_filter: String,
    #[serde(default)]
    tls: TlsSettings,
    #[serde(default = "default_connection_timeout_secs")]
    #[validate(range(min = 1, max = 300))]
    connection_timeout_secs: u64,
    #[serde(default = "default_operation_timeout_secs")]
    #[validate(range(min = 1, max = 300))]
    operation_timeout_secs: u64,
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_attributes() -> Vec<String> {
    ["cn", "mail", "userPrincipalName", "memberOf"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn default_group_filter() -> String {
    DEFAULT_GROUP_FILTER.to_string()
}

fn default_user_filter() -> String {
    DEFAULT_USER_FILTER.to_string()
}

const fn default_connection_timeout_secs() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_SECS
}

const fn default_operation_timeout_secs() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_SECS
}

fn validate_base_dn(value: &str) -> std::result::Result<(), ValidationError> {
    DistinguishedName::parse(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("invalid_base_dn"))
}

fn validate_filter_template(value: &str) -> std::result::Result<(), ValidationError> {
    if value.contains(PLACEHOLDER) {
        Ok(())
    } else {
        Err(ValidationError::new("missing_placeholder"))
    }
}

impl DirectoryConfig {
    /// Creates a configuration with default filters, attributes, TLS settings and timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationError`] if the host is empty, the port is zero or the base DN
    /// cannot be parsed.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        credentials: BindCredentials,
        base_dn: impl Into<String>,
    ) -> Result<Self> {
        let config = Self {
            host: host.into(),
            port,
            credentials,
            base_dn: base_dn.into(),
            attributes: default_attributes(),
            group_filter: default_group_filter(),
            user_filter: default_user_filter(),
            tls: TlsSettings::default(),
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] for malformed JSON and [`Error::ValidationError`] for
    /// values that fail validation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the file cannot be read, plus the errors of
    /// [`DirectoryConfig::from_json_str`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|err| {
            Error::ConfigError(format!(
                "failed to read configuration {}: {err}",
                path.display()
            ))
        })?;
        Self::from_json_str(&json)
    }

    /// Server URL derived from the host, port and `use_ssl`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the host does not form a valid URL.
    pub fn url(&self) -> Result<String> {
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        let url = format!("{}://{host}:{}", self.tls.scheme(), self.port);
        Url::parse(&url)?;
        Ok(url)
    }

    /// Returns the server host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the server port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the service account credentials.
    #[must_use]
    pub const fn credentials(&self) -> &BindCredentials {
        &self.credentials
    }

    /// Returns the search base distinguished name.
    #[must_use]
    pub fn base_dn(&self) -> &str {
        &self.base_dn
    }

    /// Attributes returned by user lookups.
    #[must_use]
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Filter template for group membership searches.
    #[must_use]
    pub fn group_filter(&self) -> &str {
        &self.group_filter
    }

    /// Filter template for user lookups.
    #[must_use]
    pub fn user_filter(&self) -> &str {
        &self.user_filter
    }

    /// Returns the TLS settings.
    #[must_use]
    pub const fn tls(&self) -> &TlsSettings {
        &self.tls
    }

    /// Returns the connection timeout duration.
    #[must_use]
    pub const fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Returns the operation timeout duration.
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Overrides the attributes returned by user lookups.
    #[must_use]
    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the group filter template.
    ///
    /// The string should contain `%s` where the username will be substituted.
    #[must_use]
    pub fn with_group_filter(mut self, template: impl Into<String>) -> Self {
        self.group_filter = template.into();
        self
    }

    /// Overrides the user filter template.
    ///
    /// The string should contain `%s` where the username will be substituted.
    #[must_use]
    pub fn with_user_filter(mut self, template: impl Into<String>) -> Self {
        self.user_filter = template.into();
        self
    }

    /// Replaces the TLS settings.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsSettings) -> Self {
        self.tls = tls;
        self
    }

    /// Overrides the connection timeout in seconds.
    #[must_use]
    pub const fn with_connection_timeout_secs(mut self, seconds: u64) -> Self {
        self.connection_timeout_secs = seconds;
        self
    }

    /// Overrides the operation timeout in seconds.
    #[must_use]
    pub const fn with_operation_timeout_secs(mut self, seconds: u64) -> Self {
        self.operation_timeout_secs = seconds;
        self
    }
}
