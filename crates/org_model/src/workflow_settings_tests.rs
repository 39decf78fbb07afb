//! Tests for workflow settings.

use serde_json::json;

use super::*;

#[test]
fn test_provider_field_renames() {
    let settings = WorkflowSettings::from_provider_data(
        WorkflowScope::Organization,
        &json!({
            "enabled_repositories": "selected",
            "selected_repositories": ["api"],
            "allowed_actions": "selected",
            "github_owned_allowed": true,
            "verified_allowed": false,
            "patterns_allowed": ["octo/*"],
            "default_workflow_permissions": "read",
            "can_approve_pull_request_reviews": false
        }),
    )
    .unwrap();

    assert_eq!(settings.allow_github_owned_actions.cloned_value(), Some(true));
    assert_eq!(settings.allow_verified_creator_actions.cloned_value(), Some(false));
    assert_eq!(
        settings.allow_action_patterns.cloned_value(),
        Some(vec!["octo/*".to_string()])
    );
    assert_eq!(
        settings.actions_can_approve_pull_request_reviews.cloned_value(),
        Some(false)
    );
}

#[tokio::test]
async fn test_model_fields_rename_back_and_repos_resolve_to_ids() {
    // no selected_repositories, so no provider traffic is needed
    let settings = WorkflowSettings::from_model_value(
        WorkflowScope::Organization,
        &json!({
            "enabled_repositories": "all",
            "allow_github_owned_actions": true,
            "default_workflow_permissions": "write"
        }),
    )
    .unwrap();

    let provider = github_client::GitHubProvider::from_octocrab(
        octocrab::Octocrab::builder().build().unwrap(),
        None,
    );
    let body = settings.to_provider_body("octo", &provider).await.unwrap();
    assert_eq!(body["enabled_repositories"], json!("all"));
    assert_eq!(body["github_owned_allowed"], json!(true));
    assert_eq!(body["default_workflow_permissions"], json!("write"));
    assert!(!body.contains_key("allow_github_owned_actions"));
}

#[test]
fn test_disabled_actions_suppress_other_fields_from_diff() {
    let expected = WorkflowSettings::from_model_value(
        WorkflowScope::Organization,
        &json!({"enabled_repositories": "none", "default_workflow_permissions": "write"}),
    )
    .unwrap();
    let current = WorkflowSettings::from_provider_data(
        WorkflowScope::Organization,
        &json!({"enabled_repositories": "none", "default_workflow_permissions": "read"}),
    )
    .unwrap();

    assert!(expected.difference_from(&current).is_empty());
}

#[test]
fn test_selected_actions_fields_only_diff_for_selected_policy() {
    let expected = WorkflowSettings::from_model_value(
        WorkflowScope::Organization,
        &json!({
            "enabled_repositories": "all",
            "allowed_actions": "all",
            "allow_github_owned_actions": true
        }),
    )
    .unwrap();
    let current = WorkflowSettings::from_provider_data(
        WorkflowScope::Organization,
        &json!({
            "enabled_repositories": "all",
            "allowed_actions": "all",
            "github_owned_allowed": false
        }),
    )
    .unwrap();

    assert!(expected.difference_from(&current).is_empty());
}

#[test]
fn test_repo_scope_uses_enabled_switch() {
    let expected = WorkflowSettings::from_model_value(
        WorkflowScope::Repository,
        &json!({"enabled": false, "allowed_actions": "all"}),
    )
    .unwrap();
    let current = WorkflowSettings::from_provider_data(
        WorkflowScope::Repository,
        &json!({"enabled": true, "allowed_actions": "local_only"}),
    )
    .unwrap();

    let changes = expected.difference_from(&current);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes["enabled"].to, json!(false));
}

#[test]
fn test_actions_restriction_ordering() {
    let org = |allowed: serde_json::Value| {
        WorkflowSettings::from_model_value(
            WorkflowScope::Organization,
            &json!({"allowed_actions": allowed}),
        )
        .unwrap()
    };
    let repo_policy = |allowed: &str| Property::Value(allowed.to_string());

    // selected is the most restricted, all the least
    assert!(org(json!("selected")).restricts_actions_at_least_as_much_as(&repo_policy("all")));
    assert!(org(json!("selected")).restricts_actions_at_least_as_much_as(&repo_policy("local_only")));
    assert!(org(json!("local_only")).restricts_actions_at_least_as_much_as(&repo_policy("local_only")));
    assert!(!org(json!("all")).restricts_actions_at_least_as_much_as(&repo_policy("local_only")));
    assert!(!org(json!("all")).restricts_actions_at_least_as_much_as(&repo_policy("selected")));

    // unset on either side never restricts
    assert!(!org(json!(null)).restricts_actions_at_least_as_much_as(&repo_policy("all")));
    assert!(!org(json!("selected")).restricts_actions_at_least_as_much_as(&Property::Unset));
}

#[test]
fn test_validation_of_enumerations() {
    let mut context = ValidationContext::new();
    WorkflowSettings::from_model_value(
        WorkflowScope::Organization,
        &json!({
            "enabled_repositories": "some",
            "allowed_actions": "everything",
            "default_workflow_permissions": "admin"
        }),
    )
    .unwrap()
    .validate(&mut context, None);
    assert_eq!(context.error_count(), 3);
}

#[test]
fn test_validation_warns_on_ignored_repository_selection() {
    let mut context = ValidationContext::new();
    WorkflowSettings::from_model_value(
        WorkflowScope::Organization,
        &json!({"enabled_repositories": "all", "selected_repositories": ["api"]}),
    )
    .unwrap()
    .validate(&mut context, None);
    assert_eq!(context.warning_count(), 1);
}
