//! Path construction, containment and union tests

use oscroute_core::{Path, ANY_PATH};

fn path(s: &str) -> Path {
    Path::parse(s).unwrap()
}

#[test]
fn test_path_requires_leading_slash() {
    assert!(Path::parse("").is_err());
    assert!(Path::parse("foo").is_err());
    assert!("foo".parse::<Path>().is_err());
}

#[test]
fn test_literal_equality_by_string() {
    assert_eq!(path("/foo"), path("/foo"));
    assert_ne!(path("/foo"), path("/bar"));
    assert_eq!(Path::try_from("/foo").unwrap(), path("/foo"));
}

#[test]
fn test_any_path_sentinel() {
    assert_eq!(Path::parse_optional(None).unwrap(), ANY_PATH);
    assert_eq!(Path::ANY, ANY_PATH);
    assert!(ANY_PATH.contains(&path("/foo")));
    assert!(ANY_PATH.contains(&path("/*")));
    assert!(ANY_PATH.contains(&ANY_PATH));
    assert!(!path("//*").contains(&ANY_PATH));
    assert!(!path("/foo").contains(&ANY_PATH));
    assert!(ANY_PATH.addresses().is_empty());
}

#[test]
fn test_contains_is_one_directional() {
    let pattern = path("/x/*");
    let literal = path("/x/y");
    assert!(pattern.contains(&literal));
    assert!(!literal.contains(&pattern));
    assert!(literal.contains(&literal));
    assert!(!path("/x/y").contains(&path("/x/z")));
}

#[test]
fn test_union_of_literals_matches_exactly_both() {
    let union = path("/foo").union(&path("/bar"));
    assert!(union.is_pattern());
    assert!(union.matches("/foo"));
    assert!(union.matches("/bar"));
    assert!(!union.matches("/baz"));
    assert!(!union.matches("/foo/bar"));
    assert!(union.contains(&path("/foo")));
    assert!(union.contains(&path("/bar")));

    let mut addresses = union.addresses();
    addresses.sort();
    assert_eq!(addresses, vec!["/bar".to_string(), "/foo".to_string()]);
}

#[test]
fn test_union_flattens() {
    let ab = path("/a").union(&path("/b"));
    let abc = ab.union(&path("/c"));
    assert_eq!(abc.addresses().len(), 3);
    assert!(abc.contains(&ab));
    assert!(!ab.contains(&abc));
    assert_eq!(path("/a").union(&path("/a")), path("/a"));
}

#[test]
fn test_pattern_addresses_are_the_pattern() {
    assert_eq!(path("/x/*").addresses(), vec!["/x/*".to_string()]);
}

#[test]
fn test_display() {
    assert_eq!(path("/foo").to_string(), "/foo");
    assert_eq!(path("/a").union(&path("/b")).to_string(), "/a | /b");
}
