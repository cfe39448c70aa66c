//! Directory client implementation.

use crate::{
    config::DirectoryConfig,
    dn::format_group_path,
    entry::{AuthenticatedUser, DirectoryEntry, SamLookup},
    filter::{render_filter, ALL_GROUPS_FILTER, SAM_ACCOUNT_FILTER},
    Result,
};
use async_trait::async_trait;
use ldap3::{LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use native_tls::{Certificate, Identity, TlsConnector};
use opldap_core::Error;
use std::fs;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use validator::Validate;

const GROUP_ATTRIBUTES: &[&str] = &["dn", "cn", "ou", "memberOf", "member", "mail"];

const MEMBERSHIP_ATTRIBUTES: &[&str] = &["dn", "cn", "ou", "memberOf", "member"];

const SAM_ATTRIBUTES: &[&str] = &[
    "dn",
    "cn",
    "ou",
    "memberOf",
    "member",
    "userPrincipalName",
];

/// LDAP result code for `invalidCredentials`.
const INVALID_CREDENTIALS: u32 = 49;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait LdapSession: Send {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()>;
    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: Vec<String>,
    ) -> Result<Vec<DirectoryEntry>>;
    async fn unbind(&mut self) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait LdapConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn LdapSession>>;
}

/// Directory client holding one bound session.
///
/// Every operation takes `&mut self`, so a client never has two requests in flight on its
/// session. Share it between tasks behind a `tokio::sync::Mutex`. The session is released by
/// [`DirectoryClient::close`] or when the client is dropped.
pub struct DirectoryClient {
    config: Arc<DirectoryConfig>,
    connector: Box<dyn LdapConnector>,
    session: Option<Box<dyn LdapSession>>,
}

impl DirectoryClient {
    /// Creates a client that dials the configured server with `ldap3`.
    ///
    /// No connection is made until [`DirectoryClient::connect`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationError`] if the configuration fails validation (for example
    /// a filter template without `%s`).
    pub fn new(config: DirectoryConfig) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let connector: Box<dyn LdapConnector> = Box::new(RealLdapConnector::new(config.clone()));
        Ok(Self {
            config,
            connector,
            session: None,
        })
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_connector(config: DirectoryConfig, connector: Box<dyn LdapConnector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
            session: None,
        }
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Returns true while a bound session is held.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Dials the server and binds as the service account.
    ///
    /// Does nothing if the client is already connected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionError`] if the server cannot be reached,
    /// [`Error::AuthenticationError`] if the bind credentials are rejected and
    /// [`Error::Timeout`] if the bind does not complete in time.
    pub async fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            debug!("directory session already established");
            return Ok(());
        }

        let mut session = self.connector.connect().await?;
        let credentials = self.config.credentials();
        debug!(bind_dn = credentials.bind_dn(), "binding to directory");
        with_deadline(
            self.config.operation_timeout(),
            "bind",
            session.simple_bind(credentials.bind_dn(), credentials.bind_password()),
        )
        .await?;

        info!(
            host = self.config.host(),
            port = self.config.port(),
            "directory session established"
        );
        self.session = Some(session);
        Ok(())
    }

    /// Unbinds and releases the session. Safe to call when not connected.
    ///
    /// # Errors
    ///
    /// Returns an error if the unbind request fails; the session is released either way.
    pub async fn close(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        debug!("closing directory session");
        with_deadline(self.config.operation_timeout(), "unbind", session.unbind()).await
    }

    /// Lists the common names of every group under the base DN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] before [`DirectoryClient::connect`] and
    /// [`Error::SearchError`] if the search fails.
    pub async fn all_groups(&mut self) -> Result<Vec<String>> {
        let entries = self
            .search(ALL_GROUPS_FILTER, owned(GROUP_ATTRIBUTES))
            .await?;

        Ok(entries
            .iter()
            .filter_map(|entry| {
                debug!(dn = %entry.dn, "group entry");
                let name = entry.first("cn").map(str::to_owned);
                if name.is_none() {
                    warn!(dn = %entry.dn, "skipping group entry without a common name");
                }
                name
            })
            .collect())
    }

    /// Lists the groups matched by the group filter for `username`, as slash-delimited paths.
    ///
    /// The username is escaped before it is substituted into the filter. No match yields an
    /// empty list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedDn`] if a matched entry's DN has no domain suffix, plus the
    /// errors of [`DirectoryClient::all_groups`].
    pub async fn groups_of_user(&mut self, username: &str) -> Result<Vec<String>> {
        let filter = render_filter(self.config.group_filter(), username);
        let entries = self.search(&filter, owned(MEMBERSHIP_ATTRIBUTES)).await?;

        entries
            .iter()
            .map(|entry| format_group_path(&entry.dn))
            .collect()
    }

    /// Resolves a user by `samaccountname`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] or [`Error::SearchError`]. Missing and duplicate accounts
    /// are reported through [`SamLookup`], not as errors.
    pub async fn user_by_sam(&mut self, username: &str) -> Result<SamLookup> {
        let filter = render_filter(SAM_ACCOUNT_FILTER, username);
        let entries = self.search(&filter, owned(SAM_ATTRIBUTES)).await?;

        let lookup = SamLookup::from_entries(entries);
        if let SamLookup::Ambiguous(count) = lookup {
            warn!(username, count, "samaccountname matched several entries");
        }
        Ok(lookup)
    }

    /// Finds the single entry matched by the user filter, with the configured attributes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when nothing matches and [`Error::Ambiguous`] when several
    /// entries match.
    pub async fn find_user(&mut self, username: &str) -> Result<DirectoryEntry> {
        let filter = render_filter(self.config.user_filter(), username);
        let attributes = self.config.attributes().to_vec();
        let entries = self.search(&filter, attributes).await?;

        match <[DirectoryEntry; 1]>::try_from(entries) {
            Ok([entry]) => Ok(entry),
            Err(entries) if entries.is_empty() => {
                Err(Error::NotFound(format!("user `{username}` not found")))
            }
            Err(entries) => Err(Error::Ambiguous {
                query: username.to_string(),
                count: entries.len(),
            }),
        }
    }

    /// Verifies a user's password by binding as the user's entry.
    ///
    /// The session is rebound as the service account afterwards so it stays usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthenticationError`] for an empty or wrong password, plus the errors
    /// of [`DirectoryClient::find_user`].
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<AuthenticatedUser> {
        if password.is_empty() {
            return Err(Error::AuthenticationError(
                "empty passwords are not accepted".to_string(),
            ));
        }

        let entry = self.find_user(username).await?;
        let user_bind = self.bind(&entry.dn, password).await.map_err(|err| match err {
            Error::AuthenticationError(_) => {
                Error::AuthenticationError(format!("invalid credentials for `{username}`"))
            }
            other => other,
        });

        let config = Arc::clone(&self.config);
        let credentials = config.credentials();
        if let Err(err) = self
            .bind(credentials.bind_dn(), credentials.bind_password())
            .await
        {
            warn!(error = %err, "failed to restore service account bind, dropping session");
            self.session = None;
            user_bind?;
            return Err(err);
        }

        user_bind?;

        debug!(dn = %entry.dn, "user authenticated");
        Ok(AuthenticatedUser::from_entry(&entry, config.attributes()))
    }

    async fn bind(&mut self, dn: &str, password: &str) -> Result<()> {
        let session = self.session.as_mut().ok_or(Error::NotConnected)?;
        with_deadline(
            self.config.operation_timeout(),
            "bind",
            session.simple_bind(dn, password),
        )
        .await
    }

    async fn search(&mut self, filter: &str, attributes: Vec<String>) -> Result<Vec<DirectoryEntry>> {
        let session = self.session.as_mut().ok_or(Error::NotConnected)?;
        debug!(base_dn = self.config.base_dn(), filter, "searching directory");
        let entries = with_deadline(
            self.config.operation_timeout(),
            "search",
            session.search(self.config.base_dn(), filter, attributes),
        )
        .await?;
        debug!(count = entries.len(), "search complete");
        Ok(entries)
    }
}

fn owned(attributes: &[&str]) -> Vec<String> {
    attributes.iter().map(ToString::to_string).collect()
}

async fn with_deadline<F, T>(duration: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    timeout(duration, fut).await.map_err(|_| {
        Error::Timeout(format!("directory {operation} timed out after {duration:?}"))
    })?
}

/// Connector that dials the directory server with `ldap3`.
pub(crate) struct RealLdapConnector {
    config: Arc<DirectoryConfig>,
}

impl RealLdapConnector {
    /// Creates a new connector instance.
    #[must_use]
    pub(crate) fn new(config: Arc<DirectoryConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LdapConnector for RealLdapConnector {
    async fn connect(&self) -> Result<Box<dyn LdapSession>> {
        let url = self.config.url()?;
        let settings = build_ldap_settings(&self.config)?;
        debug!(url = %url, starttls = self.config.tls().starttls(), "dialing directory server");

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|err| Error::ConnectionError(format!("failed to connect to {url}: {err}")))?;
        ldap3::drive!(conn);
        Ok(Box::new(RealLdapSession { inner: ldap }))
    }
}

struct RealLdapSession {
    inner: ldap3::Ldap,
}

#[async_trait]
impl LdapSession for RealLdapSession {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()> {
        let result = self
            .inner
            .simple_bind(dn, password)
            .await
            .map_err(|err| Error::ConnectionError(format!("bind as `{dn}` failed: {err}")))?;

        match result.rc {
            0 => Ok(()),
            INVALID_CREDENTIALS => Err(Error::AuthenticationError(format!(
                "bind as `{dn}` rejected: {}",
                result.text
            ))),
            rc => Err(Error::ConnectionError(format!(
                "bind as `{dn}` failed with code {rc}: {}",
                result.text
            ))),
        }
    }

    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: Vec<String>,
    ) -> Result<Vec<DirectoryEntry>> {
        let (entries, _) = self
            .inner
            .search(base_dn, Scope::Subtree, filter, attributes)
            .await
            .and_then(|result| result.success())
            .map_err(|err| Error::SearchError(format!("search `{filter}` failed: {err}")))?;

        Ok(entries
            .into_iter()
            .filter(|entry| !entry.is_ref())
            .map(SearchEntry::construct)
            .map(|entry| DirectoryEntry {
                dn: entry.dn,
                attributes: entry.attrs,
            })
            .collect())
    }

    async fn unbind(&mut self) -> Result<()> {
        self.inner
            .unbind()
            .await
            .map_err(|err| Error::ConnectionError(format!("unbind failed: {err}")))
    }
}

fn build_ldap_settings(config: &DirectoryConfig) -> Result<LdapConnSettings> {
    let tls = config.tls();
    let mut settings = LdapConnSettings::new()
        .set_conn_timeout(config.connection_timeout())
        .set_starttls(tls.starttls());

    let custom_tls =
        tls.insecure_skip_verify || tls.ca_cert.is_some() || tls.client_certificate.is_some();
    if !tls.uses_tls() || !custom_tls {
        return Ok(settings);
    }

    let mut builder = TlsConnector::builder();
    if tls.insecure_skip_verify {
        warn!("TLS certificate verification disabled for directory connection");
        builder.danger_accept_invalid_certs(true);
        settings = settings.set_no_tls_verify(true);
    }

    if let Some(ca_cert) = &tls.ca_cert {
        debug!("loading directory CA certificate from {}", ca_cert.display());
        let pem = read_pem(ca_cert, "CA certificate")?;
        let certificate = Certificate::from_pem(&pem)
            .map_err(|err| Error::ConfigError(format!("invalid CA certificate: {err}")))?;
        builder.add_root_certificate(certificate);
    }

    if let Some(client) = &tls.client_certificate {
        debug!(
            "loading client certificate from {}",
            client.cert_path.display()
        );
        let cert = read_pem(&client.cert_path, "client certificate")?;
        let key = read_pem(&client.key_path, "client key")?;
        let identity = Identity::from_pkcs8(&cert, &key)
            .map_err(|err| Error::ConfigError(format!("invalid client certificate: {err}")))?;
        builder.identity(identity);
    }

    let connector = builder
        .build()
        .map_err(|err| Error::ConfigError(format!("failed to construct TLS connector: {err}")))?;
    Ok(settings.set_connector(connector))
}

fn read_pem(path: &Path, what: &str) -> Result<Vec<u8>> {
    fs::read(path).map_err(|err| {
        Error::ConfigError(format!("failed to read {what} {}: {err}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::UserIdentity;
    use mockall::Sequence;
    use opldap_core::{BindCredentials, TlsSettings};

    const SERVICE_DN: &str = "CN=svc-ldap,OU=Service,DC=example,DC=com";
    const USER_DN: &str = "CN=jdoe,OU=People,DC=example,DC=com";

    fn sample_config() -> DirectoryConfig {
        DirectoryConfig::new(
            "dc1.example.com",
            389,
            BindCredentials::new(SERVICE_DN, "secret"),
            "DC=example,DC=com",
        )
        .unwrap()
        .with_group_filter("(&(objectClass=group)(member=%s))")
        .with_user_filter("(sAMAccountName=%s)")
        .with_attributes(["mail", "displayName"])
    }

    fn bound_session() -> MockLdapSession {
        let mut session = MockLdapSession::new();
        session
            .expect_simple_bind()
            .withf(|dn, password| dn == SERVICE_DN && password == "secret")
            .times(1)
            .returning(|_, _| Ok(()));
        session
    }

    fn client_with(session: MockLdapSession) -> DirectoryClient {
        let mut connector = MockLdapConnector::new();
        connector
            .expect_connect()
            .times(1)
            .return_once(move || Ok(Box::new(session)));
        DirectoryClient::with_connector(sample_config(), Box::new(connector))
    }

    async fn connected(session: MockLdapSession) -> DirectoryClient {
        let mut client = client_with(session);
        client.connect().await.unwrap();
        client
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let mut client = client_with(bound_session());

        client.connect().await.unwrap();
        client.connect().await.unwrap();
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn connect_reports_rejected_bind() {
        let mut session = MockLdapSession::new();
        session.expect_simple_bind().returning(|_, _| {
            Err(Error::AuthenticationError("invalid credentials".to_string()))
        });
        let mut client = client_with(session);

        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, Error::AuthenticationError(_)));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn connect_reports_unreachable_server() {
        let mut connector = MockLdapConnector::new();
        connector
            .expect_connect()
            .return_once(|| Err(Error::ConnectionError("connection refused".to_string())));
        let mut client = DirectoryClient::with_connector(sample_config(), Box::new(connector));

        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionError(_)));
    }

    #[tokio::test]
    async fn close_without_connection_is_noop() {
        let mut connector = MockLdapConnector::new();
        connector.expect_connect().never();
        let mut client = DirectoryClient::with_connector(sample_config(), Box::new(connector));

        client.close().await.unwrap();
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn close_unbinds_once() {
        let mut session = bound_session();
        session.expect_unbind().times(1).returning(|| Ok(()));
        let mut client = connected(session).await;

        client.close().await.unwrap();
        client.close().await.unwrap();
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn searches_require_connection() {
        let mut connector = MockLdapConnector::new();
        connector.expect_connect().never();
        let mut client = DirectoryClient::with_connector(sample_config(), Box::new(connector));

        assert_eq!(client.all_groups().await.unwrap_err(), Error::NotConnected);
        assert_eq!(
            client.groups_of_user("jdoe").await.unwrap_err(),
            Error::NotConnected
        );
        assert_eq!(
            client.user_by_sam("jdoe").await.unwrap_err(),
            Error::NotConnected
        );
    }

    #[tokio::test]
    async fn all_groups_returns_common_names() {
        let mut session = bound_session();
        session
            .expect_search()
            .withf(|base, filter, attributes| {
                base == "DC=example,DC=com"
                    && filter == "(ObjectClass=group)"
                    && attributes.iter().any(|a| a == "mail")
            })
            .returning(|_, _, _| {
                Ok(vec![
                    DirectoryEntry::new("CN=Admins,OU=Groups,DC=example,DC=com")
                        .with_attribute("cn", ["Admins"]),
                    DirectoryEntry::new("CN=Ops,OU=Groups,DC=example,DC=com"),
                ])
            });
        let mut client = connected(session).await;

        let groups = client.all_groups().await.unwrap();
        assert_eq!(groups, vec!["Admins".to_string()]);
    }

    #[tokio::test]
    async fn groups_of_user_formats_paths_in_order() {
        let mut session = bound_session();
        session
            .expect_search()
            .withf(|_, filter, _| filter == "(&(objectClass=group)(member=jdoe))")
            .returning(|_, _, _| {
                Ok(vec![
                    DirectoryEntry::new("CN=Admins,OU=Groups,DC=example,DC=com"),
                    DirectoryEntry::new("CN=VPN,OU=Access,OU=Groups,DC=example,DC=com"),
                ])
            });
        let mut client = connected(session).await;

        let groups = client.groups_of_user("jdoe").await.unwrap();
        assert_eq!(groups, vec!["/Groups/Admins", "/Groups/Access/VPN"]);
    }

    #[tokio::test]
    async fn groups_of_user_without_matches_is_empty() {
        let mut session = bound_session();
        session
            .expect_search()
            .returning(|_, _, _| Ok(Vec::new()));
        let mut client = connected(session).await;

        assert!(client.groups_of_user("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn groups_of_user_escapes_username() {
        let mut session = bound_session();
        session
            .expect_search()
            .withf(|_, filter, _| filter == "(&(objectClass=group)(member=\\2a\\29))")
            .returning(|_, _, _| Ok(Vec::new()));
        let mut client = connected(session).await;

        assert!(client.groups_of_user("*)").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn groups_of_user_rejects_dn_without_domain() {
        let mut session = bound_session();
        session
            .expect_search()
            .returning(|_, _, _| Ok(vec![DirectoryEntry::new("CN=Admins,OU=Groups")]));
        let mut client = connected(session).await;

        let err = client.groups_of_user("jdoe").await.unwrap_err();
        assert!(matches!(err, Error::MalformedDn(_)));
    }

    #[tokio::test]
    async fn user_by_sam_outcomes() {
        let mut session = bound_session();
        let mut sequence = Sequence::new();
        session
            .expect_search()
            .withf(|_, filter, attributes| {
                filter == "(samaccountname=jdoe)"
                    && attributes.iter().any(|a| a == "userPrincipalName")
            })
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _| {
                Ok(vec![DirectoryEntry::new(USER_DN)
                    .with_attribute("userPrincipalName", ["jdoe@example.com"])])
            });
        session
            .expect_search()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _| Ok(Vec::new()));
        session
            .expect_search()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _| {
                Ok(vec![
                    DirectoryEntry::new("CN=a,DC=example,DC=com"),
                    DirectoryEntry::new("CN=b,DC=example,DC=com"),
                ])
            });
        let mut client = connected(session).await;

        assert_eq!(
            client.user_by_sam("jdoe").await.unwrap(),
            SamLookup::Found(UserIdentity {
                distinguished_name: USER_DN.to_string(),
                user_principal_name: Some("jdoe@example.com".to_string()),
            })
        );
        assert_eq!(
            client.user_by_sam("ghost").await.unwrap(),
            SamLookup::NotFound
        );
        assert_eq!(
            client.user_by_sam("dup").await.unwrap(),
            SamLookup::Ambiguous(2)
        );
    }

    #[tokio::test]
    async fn search_failures_propagate() {
        let mut session = bound_session();
        session
            .expect_search()
            .returning(|_, _, _| Err(Error::SearchError("noSuchObject".to_string())));
        let mut client = connected(session).await;

        let err = client.all_groups().await.unwrap_err();
        assert!(matches!(err, Error::SearchError(_)));
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn find_user_uses_configured_filter_and_attributes() {
        let mut session = bound_session();
        session
            .expect_search()
            .withf(|_, filter, attributes| {
                filter == "(sAMAccountName=jdoe)"
                    && attributes == &vec!["mail".to_string(), "displayName".to_string()]
            })
            .returning(|_, _, _| {
                Ok(vec![
                    DirectoryEntry::new(USER_DN).with_attribute("mail", ["jdoe@example.com"])
                ])
            });
        let mut client = connected(session).await;

        let entry = client.find_user("jdoe").await.unwrap();
        assert_eq!(entry.dn, USER_DN);
        assert_eq!(entry.first("mail"), Some("jdoe@example.com"));
    }

    #[tokio::test]
    async fn find_user_distinguishes_missing_and_ambiguous() {
        let mut session = bound_session();
        let mut sequence = Sequence::new();
        session
            .expect_search()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _| Ok(Vec::new()));
        session
            .expect_search()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _| {
                Ok(vec![
                    DirectoryEntry::new("CN=a,DC=example,DC=com"),
                    DirectoryEntry::new("CN=b,DC=example,DC=com"),
                ])
            });
        let mut client = connected(session).await;

        assert!(matches!(
            client.find_user("ghost").await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert_eq!(
            client.find_user("dup").await.unwrap_err(),
            Error::Ambiguous {
                query: "dup".to_string(),
                count: 2
            }
        );
    }

    fn authenticating_session(user_bind: Result<()>, restore_bind: Result<()>) -> MockLdapSession {
        let mut session = MockLdapSession::new();
        let mut sequence = Sequence::new();
        session
            .expect_simple_bind()
            .withf(|dn, _| dn == SERVICE_DN)
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(()));
        session
            .expect_search()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _, _| {
                Ok(vec![DirectoryEntry::new(USER_DN)
                    .with_attribute("mail", ["jdoe@example.com"])
                    .with_attribute("displayName", ["John Doe"])])
            });
        session
            .expect_simple_bind()
            .withf(|dn, password| dn == USER_DN && password == "hunter2")
            .times(1)
            .in_sequence(&mut sequence)
            .return_once(move |_, _| user_bind);
        session
            .expect_simple_bind()
            .withf(|dn, _| dn == SERVICE_DN)
            .times(1)
            .in_sequence(&mut sequence)
            .return_once(move |_, _| restore_bind);
        session
    }

    #[tokio::test]
    async fn authenticate_binds_as_user_then_restores_service_bind() {
        let mut client = connected(authenticating_session(Ok(()), Ok(()))).await;

        let user = client.authenticate("jdoe", "hunter2").await.unwrap();
        assert_eq!(user.dn, USER_DN);
        assert_eq!(user.attribute("mail"), Some("jdoe@example.com"));
        assert_eq!(user.attribute("displayName"), Some("John Doe"));
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn authenticate_rejects_wrong_password() {
        let mut client = connected(authenticating_session(
            Err(Error::AuthenticationError("rejected".to_string())),
            Ok(()),
        ))
        .await;

        let err = client.authenticate("jdoe", "hunter2").await.unwrap_err();
        assert_eq!(
            err,
            Error::AuthenticationError("invalid credentials for `jdoe`".to_string())
        );
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn authenticate_drops_session_when_service_rebind_fails() {
        let mut client = connected(authenticating_session(
            Ok(()),
            Err(Error::ConnectionError("connection reset".to_string())),
        ))
        .await;

        let err = client.authenticate("jdoe", "hunter2").await.unwrap_err();
        assert_eq!(err, Error::ConnectionError("connection reset".to_string()));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn authenticate_reports_wrong_password_when_rebind_also_fails() {
        let mut client = connected(authenticating_session(
            Err(Error::AuthenticationError("bind as `CN=jdoe` rejected".to_string())),
            Err(Error::ConnectionError("connection reset".to_string())),
        ))
        .await;

        let err = client.authenticate("jdoe", "hunter2").await.unwrap_err();
        assert_eq!(
            err,
            Error::AuthenticationError("invalid credentials for `jdoe`".to_string())
        );
        assert!(!client.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_operations_time_out() {
        let result = with_deadline(Duration::from_secs(1), "search", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn operations_within_deadline_complete() {
        let result = with_deadline(Duration::from_secs(5), "bind", async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(7)
        })
        .await;

        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn authenticate_rejects_empty_password_without_binding() {
        let mut client = connected(bound_session()).await;

        let err = client.authenticate("jdoe", "").await.unwrap_err();
        assert!(matches!(err, Error::AuthenticationError(_)));
    }

    #[test]
    fn new_validates_configuration() {
        let config = sample_config().with_user_filter("(uid=fixed)");
        let err = DirectoryClient::new(config).err().unwrap();
        assert!(matches!(err, Error::ValidationError(_)));
    }

    #[test]
    fn plain_settings_skip_custom_connector() {
        let config = sample_config();
        assert!(build_ldap_settings(&config).is_ok());
    }

    #[test]
    fn missing_ca_certificate_is_config_error() {
        let config = sample_config().with_tls(
            TlsSettings::new()
                .with_ssl(true)
                .with_ca_cert("/nonexistent/ca.pem"),
        );
        let err = build_ldap_settings(&config).err().unwrap();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}
