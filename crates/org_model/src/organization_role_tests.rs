//! Tests for organization roles.

use serde_json::json;

use super::*;

#[test]
fn test_null_base_role_reads_as_none() {
    let role = OrganizationRole::from_provider_data(&json!({
        "id": 90,
        "name": "security-auditor",
        "base_role": null,
        "permissions": ["read_audit_logs"],
        "created_at": "2024-01-01"
    }))
    .unwrap();

    assert_eq!(role.base_role.as_deref(), Some("none"));
    assert_eq!(role.id.cloned_value(), Some(90));
}

#[tokio::test]
async fn test_none_base_role_is_omitted_on_write() {
    let role = OrganizationRole::from_model_value(&json!({
        "name": "auditor",
        "base_role": "none",
        "permissions": ["read_audit_logs"]
    }))
    .unwrap();

    let provider = github_client::GitHubProvider::from_octocrab(
        octocrab::Octocrab::builder().build().unwrap(),
        None,
    );
    let body = role.to_provider_body("octo", &provider).await.unwrap();
    assert!(!body.contains_key("base_role"));
    assert_eq!(body["permissions"], json!(["read_audit_logs"]));
}

#[test]
fn test_validation_rejects_unknown_base_role() {
    let mut context = ValidationContext::new();
    OrganizationRole::from_model_value(&json!({"name": "auditor", "base_role": "owner"}))
        .unwrap()
        .validate(&mut context, None);
    assert_eq!(context.error_count(), 1);
}

#[test]
fn test_validation_warns_on_empty_permissions() {
    let mut context = ValidationContext::new();
    OrganizationRole::from_model_value(&json!({"name": "auditor", "permissions": []}))
        .unwrap()
        .validate(&mut context, None);
    assert_eq!(context.warning_count(), 1);
}
