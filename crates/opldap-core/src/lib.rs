//! # opldap-core
//!
//! Shared building blocks for the `opldap` directory client.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy for directory operations
//! - [`credentials`] - Bind credentials with secret password handling
//! - [`tls`] - TLS settings for LDAP connections

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod credentials;
pub mod error;
pub mod tls;

// Re-export commonly used types
pub use credentials::BindCredentials;
pub use error::{Error, Result};
pub use tls::{ClientCertificate, TlsSettings};
