//! Tests for custom property definitions.

use serde_json::json;

use super::*;

#[test]
fn test_property_name_rename_from_provider() {
    let property = CustomProperty::from_provider_data(&json!({
        "property_name": "tier",
        "value_type": "single_select",
        "required": true,
        "default_value": "silver",
        "allowed_values": ["gold", "silver"],
        "url": "https://api.github.com/orgs/octo/properties/schema/tier"
    }))
    .unwrap();

    assert_eq!(property.name.as_deref(), Some("tier"));
    assert_eq!(property.value_type.as_deref(), Some("single_select"));
    assert!(!property.to_model_map().contains_key("url"));
}

#[test]
fn test_validation_requires_allowed_values_for_selects() {
    let mut context = ValidationContext::new();
    CustomProperty::from_model_value(&json!({"name": "tier", "value_type": "single_select"}))
        .unwrap()
        .validate(&mut context, None);
    assert_eq!(context.error_count(), 1);
}

#[test]
fn test_validation_rejects_default_outside_allowed_values() {
    let mut context = ValidationContext::new();
    CustomProperty::from_model_value(&json!({
        "name": "tier",
        "value_type": "single_select",
        "allowed_values": ["gold", "silver"],
        "default_value": "bronze"
    }))
    .unwrap()
    .validate(&mut context, None);
    assert_eq!(context.error_count(), 1);
}

#[test]
fn test_validation_requires_default_for_required_properties() {
    let mut context = ValidationContext::new();
    CustomProperty::from_model_value(&json!({
        "name": "team",
        "value_type": "string",
        "required": true
    }))
    .unwrap()
    .validate(&mut context, None);
    assert_eq!(context.error_count(), 1);
}

#[test]
fn test_validation_accepts_complete_definition() {
    let mut context = ValidationContext::new();
    CustomProperty::from_model_value(&json!({
        "name": "tier",
        "value_type": "single_select",
        "required": true,
        "default_value": "silver",
        "allowed_values": ["gold", "silver"]
    }))
    .unwrap()
    .validate(&mut context, None);
    assert_eq!(context.error_count(), 0);
}

#[test]
fn test_validation_rejects_unknown_value_type() {
    let mut context = ValidationContext::new();
    CustomProperty::from_model_value(&json!({"name": "tier", "value_type": "number"}))
        .unwrap()
        .validate(&mut context, None);
    assert_eq!(context.error_count(), 1);
}
