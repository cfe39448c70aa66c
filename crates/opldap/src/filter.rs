//! Search filter templating.
//!
//! Filter templates carry a `%s` placeholder (e.g. `(memberUid=%s)`). Values are escaped per
//! RFC 4515 before substitution so a username cannot widen or rewrite the filter.

/// Placeholder substituted by [`render_filter`].
pub const PLACEHOLDER: &str = "%s";

/// Filter matching every group object.
pub const ALL_GROUPS_FILTER: &str = "(ObjectClass=group)";

/// Filter template resolving a user by SAM account name.
pub const SAM_ACCOUNT_FILTER: &str = "(samaccountname=%s)";

/// Escapes a value for use inside an LDAP filter assertion.
#[must_use]
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\5c"),
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Substitutes every `%s` in `template` with the escaped `value`.
#[must_use]
pub fn render_filter(template: &str, value: &str) -> String {
    template.replace(PLACEHOLDER, &escape_filter_value(value))
}
