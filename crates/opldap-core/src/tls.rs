//! TLS settings for LDAP connections.

use serde::Deserialize;
use std::path::PathBuf;

/// PEM-encoded client certificate and PKCS#8 private key used for mutual TLS.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientCertificate {
    /// Path to the PEM certificate chain
    pub cert_path: PathBuf,
    /// Path to the PEM (PKCS#8) private key
    pub key_path: PathBuf,
}

impl ClientCertificate {
    /// Create a client certificate reference.
    #[must_use]
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }
}

/// Transport security flags.
///
/// `use_ssl` selects the `ldaps` scheme. On a plain connection STARTTLS is negotiated unless
/// `skip_tls` is set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TlsSettings {
    /// Connect with LDAPS
    #[serde(default)]
    pub use_ssl: bool,

    /// Do not upgrade plain connections with STARTTLS
    #[serde(default = "default_skip_tls")]
    pub skip_tls: bool,

    /// Accept invalid server certificates
    #[serde(default)]
    pub insecure_skip_verify: bool,

    /// Optional path to a custom CA certificate (PEM)
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,

    /// Optional client certificate for mutual TLS
    #[serde(default)]
    pub client_certificate: Option<ClientCertificate>,
}

const fn default_skip_tls() -> bool {
    true
}

impl TlsSettings {
    /// Plain LDAP without STARTTLS, verification enabled for when TLS is turned on.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            use_ssl: false,
            skip_tls: default_skip_tls(),
            insecure_skip_verify: false,
            ca_cert: None,
            client_certificate: None,
        }
    }

    /// Enable or disable LDAPS.
    #[must_use]
    pub const fn with_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    /// Enable or disable skipping the STARTTLS upgrade.
    #[must_use]
    pub const fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.skip_tls = skip_tls;
        self
    }

    /// Enable or disable certificate verification bypass.
    #[must_use]
    pub const fn with_insecure_skip_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_verify = skip;
        self
    }

    /// Set custom CA certificate path.
    #[must_use]
    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert = Some(path.into());
        self
    }

    /// Set the client certificate presented during the handshake.
    #[must_use]
    pub fn with_client_certificate(mut self, certificate: ClientCertificate) -> Self {
        self.client_certificate = Some(certificate);
        self
    }

    /// URL scheme matching `use_ssl`.
    #[must_use]
    pub const fn scheme(&self) -> &'static str {
        if self.use_ssl {
            "ldaps"
        } else {
            "ldap"
        }
    }

    /// Whether a plain connection should be upgraded with STARTTLS.
    #[must_use]
    pub const fn starttls(&self) -> bool {
        !self.use_ssl && !self.skip_tls
    }

    /// Whether any TLS is negotiated at all.
    #[must_use]
    pub const fn uses_tls(&self) -> bool {
        self.use_ssl || !self.skip_tls
    }
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_plain_ldap() {
        let tls = TlsSettings::default();
        assert_eq!(tls.scheme(), "ldap");
        assert!(!tls.starttls());
        assert!(!tls.uses_tls());
        assert!(!tls.insecure_skip_verify);
    }

    #[test]
    fn test_starttls_only_on_plain_connections() {
        let tls = TlsSettings::new().with_skip_tls(false);
        assert!(tls.starttls());
        assert_eq!(tls.scheme(), "ldap");

        let tls = tls.with_ssl(true);
        assert!(!tls.starttls());
        assert!(tls.uses_tls());
        assert_eq!(tls.scheme(), "ldaps");
    }

    #[test]
    fn test_deserialize_with_client_certificate() {
        let tls: TlsSettings = serde_json::from_str(
            r#"{
                "use_ssl": true,
                "client_certificate": {"cert_path": "/etc/ldap/client.pem", "key_path": "/etc/ldap/client.key"}
            }"#,
        )
        .unwrap();

        assert!(tls.use_ssl);
        assert!(tls.skip_tls);
        assert_eq!(
            tls.client_certificate,
            Some(ClientCertificate::new("/etc/ldap/client.pem", "/etc/ldap/client.key"))
        );
    }
}
