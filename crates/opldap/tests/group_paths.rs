//! Integration tests for the DN to group path formatter.
//!
//! These exercise the public API with distinguished names in the shapes Active Directory and
//! OpenLDAP return for group entries.

use opldap::{format_group_path, DistinguishedName, Error};

#[test]
fn test_nested_organizational_units() {
    let path =
        format_group_path("CN=Admins,OU=Groups,DC=example,DC=com").expect("valid group DN");
    assert_eq!(path, "/Groups/Admins");

    let path = format_group_path("CN=Readers,OU=Wiki,OU=Apps,OU=Groups,DC=corp,DC=example,DC=com")
        .expect("valid nested group DN");
    assert_eq!(path, "/Groups/Apps/Wiki/Readers");
}

#[test]
fn test_root_components_come_first() {
    let path = format_group_path("CN=Leaf,OU=Middle,OU=Root,DC=example,DC=com").unwrap();
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    assert_eq!(segments, vec!["Root", "Middle", "Leaf"]);
}

#[test]
fn test_group_directly_under_domain() {
    assert_eq!(format_group_path("CN=X,DC=a,DC=b").unwrap(), "/X");
}

#[test]
fn test_escaped_comma_stays_in_segment() {
    let path = format_group_path("CN=Sales\\, EMEA,OU=Groups,DC=example,DC=com").unwrap();
    assert_eq!(path, "/Groups/Sales, EMEA");
}

#[test]
fn test_formatting_is_deterministic() {
    let dn = "CN=Admins,OU=Groups,DC=example,DC=com";
    assert_eq!(format_group_path(dn).unwrap(), format_group_path(dn).unwrap());
    assert_eq!(
        DistinguishedName::parse(dn).unwrap().group_path().unwrap(),
        format_group_path(dn).unwrap()
    );
}

#[test]
fn test_malformed_inputs_return_errors() {
    let inputs = [
        "",
        "   ",
        "Admins",
        "CN=Admins,OU=Groups",
        "DC=example",
        "CN=Admins,,DC=example",
        "CN=Admins\\",
        ",DC=example",
        "=,=",
        "CN=Admins,OU=Groups,O=Example",
    ];

    for input in inputs {
        let result = format_group_path(input);
        assert!(
            matches!(result, Err(Error::MalformedDn(_))),
            "expected MalformedDn for {input:?}, got {result:?}"
        );
    }
}
