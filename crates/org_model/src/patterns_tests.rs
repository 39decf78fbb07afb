//! Tests for dummy-secret and glob helpers.

use super::*;

#[test]
fn test_dummy_secret_detection() {
    assert!(is_dummy_secret("********"));
    assert!(is_dummy_secret("*"));
    assert!(!is_dummy_secret(""));
    assert!(!is_dummy_secret("***x***"));
    assert!(!is_dummy_secret("pass:hook"));
}

#[test]
fn test_secret_reference_shape() {
    assert!(is_secret_reference("pass:ci/webhook"));
    assert!(!is_secret_reference("plaintext"));
    assert!(!is_secret_reference(":x"));
    assert!(!is_secret_reference("x:"));
}

#[test]
fn test_glob_translation() {
    let regex = glob_to_regex("api-*").unwrap();
    assert!(regex.is_match("api-server"));
    assert!(!regex.is_match("web-api-server"));

    let regex = glob_to_regex("release-?").unwrap();
    assert!(regex.is_match("release-1"));
    assert!(!regex.is_match("release-12"));
}

#[test]
fn test_glob_escapes_regex_metacharacters() {
    let regex = glob_to_regex("a.b+c").unwrap();
    assert!(regex.is_match("a.b+c"));
    assert!(!regex.is_match("axb+c"));
}

#[test]
fn test_glob_matches_any() {
    let names = vec!["api".to_string(), "website".to_string()];
    assert!(glob_matches_any("api", &names).unwrap());
    assert!(glob_matches_any("web*", &names).unwrap());
    assert!(!glob_matches_any("mobile-*", &names).unwrap());
}
