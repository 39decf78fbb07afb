//! Tests for the variable entity.

use serde_json::json;

use super::*;

#[test]
fn test_provider_round_trip() {
    let variable = Variable::from_provider_data(
        VariableScope::Organization,
        &json!({
            "name": "REGION",
            "value": "eu-west-1",
            "visibility": "all",
            "updated_at": "2024-05-01"
        }),
    )
    .unwrap();

    assert_eq!(variable.name.as_deref(), Some("REGION"));
    assert_eq!(variable.value.as_deref(), Some("eu-west-1"));
    assert_eq!(variable.visibility.as_deref(), Some("public"));
}

#[test]
fn test_values_diff_unlike_secrets() {
    let expected = Variable::from_model_value(
        VariableScope::Repository,
        &json!({"name": "REGION", "value": "eu-west-1"}),
    )
    .unwrap();
    let current = Variable::from_model_value(
        VariableScope::Repository,
        &json!({"name": "REGION", "value": "us-east-1"}),
    )
    .unwrap();

    let changes = expected.difference_from(&current);
    assert_eq!(changes["value"].from, json!("us-east-1"));
    assert_eq!(changes["value"].to, json!("eu-west-1"));
}

#[test]
fn test_selected_visibility_warning() {
    let mut context = ValidationContext::new();
    Variable::from_model_value(
        VariableScope::Organization,
        &json!({"name": "REGION", "visibility": "selected"}),
    )
    .unwrap()
    .validate(&mut context, None);
    assert_eq!(context.warning_count(), 1);
}
