//! Tests for the secret entity.

use serde_json::json;

use super::*;

#[test]
fn test_provider_all_visibility_maps_to_public() {
    let secret = Secret::from_provider_data(
        SecretScope::Organization,
        &json!({"name": "DEPLOY_KEY", "visibility": "all", "created_at": "2024-01-01"}),
    )
    .unwrap();

    assert_eq!(secret.visibility.as_deref(), Some("public"));
    assert_eq!(secret.name.as_deref(), Some("DEPLOY_KEY"));
    // timestamps are provider noise
    assert!(!secret.to_model_map().contains_key("created_at"));
}

#[test]
fn test_scoped_secrets_have_no_visibility_fields() {
    let secret = Secret::from_model_value(
        SecretScope::Repository,
        &json!({"name": "TOKEN", "value": "pass:token"}),
    )
    .unwrap();

    let specs: Vec<&str> = secret.field_specs().iter().map(|spec| spec.name).collect();
    assert_eq!(specs, vec!["name", "value"]);
}

#[test]
fn test_value_is_excluded_from_plain_diff() {
    let expected = Secret::from_model_value(
        SecretScope::Organization,
        &json!({"name": "KEY", "value": "pass:key", "visibility": "public"}),
    )
    .unwrap();
    let current = Secret::from_provider_data(
        SecretScope::Organization,
        &json!({"name": "KEY", "visibility": "all"}),
    )
    .unwrap();

    assert!(expected.difference_from(&current).is_empty());
}

#[test]
fn test_visibility_changes_diff_normally() {
    let expected = Secret::from_model_value(
        SecretScope::Organization,
        &json!({"name": "KEY", "visibility": "private"}),
    )
    .unwrap();
    let current = Secret::from_provider_data(
        SecretScope::Organization,
        &json!({"name": "KEY", "visibility": "all"}),
    )
    .unwrap();

    let changes = expected.difference_from(&current);
    assert_eq!(changes["visibility"].from, json!("public"));
    assert_eq!(changes["visibility"].to, json!("private"));
}

#[test]
fn test_dummy_value_detection() {
    let dummy = Secret::from_model_value(
        SecretScope::Organization,
        &json!({"name": "KEY", "value": "*****"}),
    )
    .unwrap();
    assert!(dummy.has_dummy_secret());
    assert!(!dummy.has_real_value());
}

#[test]
fn test_validation_of_selected_visibility() {
    let mut context = ValidationContext::new();
    Secret::from_model_value(
        SecretScope::Organization,
        &json!({"name": "KEY", "visibility": "selected"}),
    )
    .unwrap()
    .validate(&mut context, None);
    // selected without a repository list is suspicious
    assert_eq!(context.warning_count(), 1);

    let mut context = ValidationContext::new();
    Secret::from_model_value(
        SecretScope::Organization,
        &json!({"name": "KEY", "visibility": "public", "selected_repositories": ["api"]}),
    )
    .unwrap()
    .validate(&mut context, None);
    assert_eq!(context.warning_count(), 1);
}

#[test]
fn test_validation_rejects_unknown_visibility() {
    let mut context = ValidationContext::new();
    Secret::from_model_value(
        SecretScope::Organization,
        &json!({"name": "KEY", "visibility": "internal"}),
    )
    .unwrap()
    .validate(&mut context, None);
    assert_eq!(context.error_count(), 1);
}
