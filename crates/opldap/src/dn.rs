//! Distinguished name parsing and the slash-delimited group path format.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use opldap_core::Error as CoreError;

/// Errors that can occur when parsing or formatting distinguished names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DistinguishedNameError {
    /// The distinguished name was empty.
    #[error("distinguished name cannot be empty")]
    Empty,
    /// A component in the distinguished name was invalid.
    #[error("invalid distinguished name component: {0}")]
    InvalidComponent(String),
    /// A component was missing the attribute name to the left of the `=`.
    #[error("distinguished name component missing attribute: {0}")]
    MissingAttribute(String),
    /// A component was missing the value to the right of the `=`.
    #[error("distinguished name component missing value for attribute {0}")]
    MissingValue(String),
    /// An escape sequence was truncated or decoded to invalid UTF-8.
    #[error("invalid escape sequence in distinguished name value: {0}")]
    InvalidEscape(String),
    /// No `DC=` component follows the leading components.
    #[error("distinguished name has no domain component suffix: {0}")]
    MissingDomainSuffix(String),
}

impl From<DistinguishedNameError> for CoreError {
    fn from(err: DistinguishedNameError) -> Self {
        CoreError::MalformedDn(err.to_string())
    }
}

/// Single `attribute=value` pair of a relative distinguished name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValue {
    attribute: String,
    value: String,
}

impl AttributeValue {
    /// Attribute type (e.g. `CN`).
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Unescaped attribute value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns true if the attribute type matches (case-insensitive).
    #[must_use]
    pub fn matches_attribute(&self, attribute: &str) -> bool {
        self.attribute.eq_ignore_ascii_case(attribute)
    }

    fn path_segment(&self) -> String {
        if self.matches_attribute("cn") || self.matches_attribute("ou") {
            self.value.clone()
        } else {
            format!("{}={}", self.attribute, self.value)
        }
    }
}

/// Parsed distinguished name.
///
/// Keeps the string as the server returned it next to the decoded relative distinguished names
/// (leaf first). Multi-valued RDNs (`CN=a+UID=b`) hold more than one [`AttributeValue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinguishedName {
    raw: String,
    rdns: Vec<Vec<AttributeValue>>,
}

impl DistinguishedName {
    /// Parses a distinguished name following the RFC 4514 string form.
    ///
    /// Both backslash-escaped special characters (`\,`) and hex pairs (`\2C`) are decoded.
    ///
    /// # Errors
    ///
    /// Returns [`DistinguishedNameError`] if the input is empty or contains invalid syntax.
    pub fn parse(input: impl AsRef<str>) -> std::result::Result<Self, DistinguishedNameError> {
        let raw = input.as_ref().trim();
        if raw.is_empty() {
            return Err(DistinguishedNameError::Empty);
        }

        let rdns = split_unescaped(raw, ',')?
            .into_iter()
            .map(|rdn| {
                split_unescaped(rdn, '+')?
                    .into_iter()
                    .map(parse_attribute_value)
                    .collect::<std::result::Result<Vec<_>, _>>()
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: raw.to_string(),
            rdns,
        })
    }

    /// Returns the RDNs leaf first (each inner vec is one `+`-joined RDN).
    #[must_use]
    pub fn rdns(&self) -> &[Vec<AttributeValue>] {
        &self.rdns
    }

    /// Iterates over every attribute/value pair in order.
    pub fn components(&self) -> impl Iterator<Item = &AttributeValue> + '_ {
        self.rdns.iter().flatten()
    }

    /// Value of the first component whose attribute matches (case-insensitive).
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.components()
            .find(|component| component.matches_attribute(attribute))
            .map(AttributeValue::value)
    }

    /// Renders the DN as a slash-delimited path rooted above the domain suffix.
    ///
    /// Everything from the first non-leading `DC=` RDN onward is dropped, `CN`/`OU` components
    /// render as their bare value and the remaining RDNs are emitted root first:
    /// `CN=Admins,OU=Groups,DC=example,DC=com` becomes `/Groups/Admins`.
    ///
    /// # Errors
    ///
    /// Returns [`DistinguishedNameError::MissingDomainSuffix`] when no `DC=` RDN follows the
    /// first one.
    pub fn group_path(&self) -> std::result::Result<String, DistinguishedNameError> {
        let suffix_start = self
            .rdns
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, rdn)| rdn.first().is_some_and(|c| c.matches_attribute("dc")))
            .map(|(index, _)| index)
            .ok_or_else(|| DistinguishedNameError::MissingDomainSuffix(self.raw.clone()))?;

        let segments = self.rdns[..suffix_start]
            .iter()
            .rev()
            .map(|rdn| {
                rdn.iter()
                    .map(AttributeValue::path_segment)
                    .collect::<Vec<_>>()
                    .join("+")
            })
            .collect::<Vec<_>>();

        Ok(format!("/{}", segments.join("/")))
    }
}

/// Parses `dn` and renders it with [`DistinguishedName::group_path`].
///
/// Total over all inputs: anything that is not a DN with a domain suffix yields
/// [`CoreError::MalformedDn`].
///
/// # Errors
///
/// Returns [`CoreError::MalformedDn`] if the input cannot be parsed or has no `DC=` suffix.
pub fn format_group_path(dn: &str) -> opldap_core::Result<String> {
    Ok(DistinguishedName::parse(dn)?.group_path()?)
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for DistinguishedName {
    type Err = DistinguishedNameError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Splits on `delimiter` wherever it is not escaped, leaving escapes in place for
/// [`unescape`].
fn split_unescaped(
    input: &str,
    delimiter: char,
) -> std::result::Result<Vec<&str>, DistinguishedNameError> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escape = false;

    for (index, ch) in input.char_indices() {
        if escape {
            escape = false;
        } else if ch == '\\' {
            escape = true;
        } else if ch == delimiter {
            parts.push(trim_component(&input[start..index]));
            start = index + ch.len_utf8();
        }
    }

    if escape {
        return Err(DistinguishedNameError::InvalidEscape(input.to_string()));
    }

    parts.push(trim_component(&input[start..]));
    if parts.iter().any(|part| part.is_empty()) {
        return Err(DistinguishedNameError::InvalidComponent(input.to_string()));
    }
    Ok(parts)
}

/// Trims surrounding whitespace but keeps a trailing escaped space (`\ `).
fn trim_component(part: &str) -> &str {
    let leading = part.trim_start();
    let trimmed = leading.trim_end();
    if trimmed.ends_with('\\') && trimmed.len() < leading.len() {
        let next = leading[trimmed.len()..]
            .chars()
            .next()
            .map_or(0, char::len_utf8);
        &leading[..trimmed.len() + next]
    } else {
        trimmed
    }
}

fn parse_attribute_value(
    component: &str,
) -> std::result::Result<AttributeValue, DistinguishedNameError> {
    let (attribute, value) = component
        .split_once('=')
        .ok_or_else(|| DistinguishedNameError::InvalidComponent(component.to_string()))?;
    let attribute = attribute.trim();
    let value = value.trim_start();

    if attribute.is_empty() {
        return Err(DistinguishedNameError::MissingAttribute(
            component.to_string(),
        ));
    }
    if value.is_empty() {
        return Err(DistinguishedNameError::MissingValue(attribute.to_string()));
    }

    Ok(AttributeValue {
        attribute: attribute.to_string(),
        value: unescape(value)?,
    })
}

fn unescape(value: &str) -> std::result::Result<String, DistinguishedNameError> {
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] != b'\\' {
            decoded.push(bytes[index]);
            index += 1;
            continue;
        }

        let pair = bytes.get(index + 1..index + 3);
        match pair.and_then(decode_hex_pair) {
            Some(byte) => {
                decoded.push(byte);
                index += 3;
            }
            None => {
                let escaped = bytes
                    .get(index + 1)
                    .ok_or_else(|| DistinguishedNameError::InvalidEscape(value.to_string()))?;
                decoded.push(*escaped);
                index += 2;
            }
        }
    }

    String::from_utf8(decoded).map_err(|_| DistinguishedNameError::InvalidEscape(value.to_string()))
}

fn decode_hex_pair(pair: &[u8]) -> Option<u8> {
    let high = char::from(pair[0]).to_digit(16)?;
    let low = char::from(pair[1]).to_digit(16)?;
    u8::try_from(high * 16 + low).ok()
}
