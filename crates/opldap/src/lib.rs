//! Directory helper over LDAP / Active Directory.
//!
//! [`DirectoryClient`] holds one bound `ldap3` session and runs a handful of fixed-shape
//! searches: every group under the base DN, the groups a user belongs to (rendered as
//! slash-delimited paths by [`format_group_path`]), a user resolved by SAM account name, and
//! password verification through the configured user filter.

#![deny(missing_docs)]

mod client;
mod config;
mod dn;
mod entry;
pub mod filter;

pub use client::DirectoryClient;
pub use config::{
    DirectoryConfig, DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_GROUP_FILTER,
    DEFAULT_OPERATION_TIMEOUT_SECS, DEFAULT_PORT, DEFAULT_USER_FILTER,
};
pub use dn::{format_group_path, AttributeValue, DistinguishedName, DistinguishedNameError};
pub use entry::{AuthenticatedUser, DirectoryEntry, SamLookup, UserIdentity};
pub use opldap_core::{BindCredentials, ClientCertificate, Error, TlsSettings};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = opldap_core::Result<T>;
