//! Search result entries and the lookup outcomes built from them.

use opldap_core::Error;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Directory entry returned by a search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attribute map (values keep the server's order).
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// Creates an entry without attributes.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    /// Adds values for an attribute.
    #[must_use]
    pub fn with_attribute<I, S>(mut self, attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.insert(
            attribute.into(),
            values.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Returns the first value of the attribute if present.
    ///
    /// Attribute names are matched case-insensitively, since servers echo the requested
    /// attribute names in their own casing.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.values(attribute)
            .and_then(|values| values.first().map(String::as_str))
    }

    /// Returns all values for the attribute.
    #[must_use]
    pub fn values(&self, attribute: &str) -> Option<&[String]> {
        self.attributes
            .get(attribute)
            .or_else(|| {
                self.attributes
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
                    .map(|(_, values)| values)
            })
            .map(Vec::as_slice)
    }
}

/// A user resolved by SAM account name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserIdentity {
    /// Distinguished name of the user entry.
    pub distinguished_name: String,
    /// `userPrincipalName`, when the entry carries one.
    pub user_principal_name: Option<String>,
}

/// Outcome of a lookup that expects exactly one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamLookup {
    /// Exactly one entry matched.
    Found(UserIdentity),
    /// Nothing matched.
    NotFound,
    /// More than one entry matched; carries the match count.
    Ambiguous(usize),
}

impl SamLookup {
    pub(crate) fn from_entries(entries: Vec<DirectoryEntry>) -> Self {
        match <[DirectoryEntry; 1]>::try_from(entries) {
            Ok([entry]) => Self::Found(UserIdentity {
                user_principal_name: entry.first("userPrincipalName").map(str::to_owned),
                distinguished_name: entry.dn,
            }),
            Err(entries) if entries.is_empty() => Self::NotFound,
            Err(entries) => Self::Ambiguous(entries.len()),
        }
    }

    /// Returns the identity if exactly one entry matched.
    #[must_use]
    pub fn found(self) -> Option<UserIdentity> {
        match self {
            Self::Found(identity) => Some(identity),
            Self::NotFound | Self::Ambiguous(_) => None,
        }
    }

    /// Converts the non-unique outcomes into errors for callers that want `?`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] or [`Error::Ambiguous`].
    pub fn into_identity(self, username: &str) -> opldap_core::Result<UserIdentity> {
        match self {
            Self::Found(identity) => Ok(identity),
            Self::NotFound => Err(Error::NotFound(format!(
                "no account with samaccountname `{username}`"
            ))),
            Self::Ambiguous(count) => Err(Error::Ambiguous {
                query: username.to_string(),
                count,
            }),
        }
    }
}

/// User entry that passed authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    /// Distinguished name the user bound as.
    pub dn: String,
    /// First value of each configured attribute the entry carries.
    pub attributes: BTreeMap<String, String>,
}

impl AuthenticatedUser {
    pub(crate) fn from_entry(entry: &DirectoryEntry, requested: &[String]) -> Self {
        let attributes = requested
            .iter()
            .filter_map(|name| {
                entry
                    .first(name)
                    .map(|value| (name.clone(), value.to_string()))
            })
            .collect();
        Self {
            dn: entry.dn.clone(),
            attributes,
        }
    }

    /// Returns the value of an attribute if the entry carried it.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}
