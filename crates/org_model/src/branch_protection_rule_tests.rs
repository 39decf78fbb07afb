//! Tests for branch protection rules.

use serde_json::json;

use super::*;

#[test]
fn test_graphql_node_maps_to_model_fields() {
    let rule = BranchProtectionRule::from_provider_data(&json!({
        "id": "BPR_1",
        "pattern": "main",
        "requiresApprovingReviews": true,
        "requiredApprovingReviewCount": 2,
        "dismissesStaleReviews": false,
        "requiresConversationResolution": true,
        "restrictsPushes": true,
        "push_restrictions": ["@octo/core"],
        "review_dismissal_allowances": [],
        "bypass_pull_request_allowances": [],
        "bypass_force_push_allowances": [],
        "requiredStatusChecks": [
            {"app": {"slug": "github-actions"}, "context": "build"},
            {"app": null, "context": "external-check"}
        ]
    }))
    .unwrap();

    assert_eq!(rule.pattern.as_deref(), Some("main"));
    assert_eq!(rule.required_approving_review_count.cloned_value(), Some(2));
    assert_eq!(rule.restricts_pushes.cloned_value(), Some(true));
    assert_eq!(
        rule.push_restrictions.cloned_value(),
        Some(vec!["@octo/core".to_string()])
    );
    assert_eq!(
        rule.required_status_checks.cloned_value(),
        Some(vec![
            "github-actions:build".to_string(),
            "any:external-check".to_string()
        ])
    );
    assert_eq!(rule.requires_conversation_resolution.cloned_value(), Some(true));
}

#[test]
fn test_identity_diff_is_empty() {
    let data = json!({
        "pattern": "main",
        "requiresApprovingReviews": true,
        "requiredApprovingReviewCount": 1,
        "push_restrictions": ["@octo/core"]
    });
    let rule = BranchProtectionRule::from_provider_data(&data).unwrap();
    assert!(rule.difference_from(&rule.clone()).is_empty());
}

#[test]
fn test_review_count_range_validation() {
    let mut context = ValidationContext::new();
    BranchProtectionRule::from_model_value(&json!({
        "pattern": "main",
        "requires_approving_reviews": true,
        "required_approving_review_count": 11
    }))
    .unwrap()
    .validate(&mut context, None);
    assert_eq!(context.error_count(), 1);

    let mut context = ValidationContext::new();
    BranchProtectionRule::from_model_value(&json!({
        "pattern": "main",
        "requires_approving_reviews": true,
        "required_approving_review_count": 2
    }))
    .unwrap()
    .validate(&mut context, None);
    assert_eq!(context.error_count(), 0);
}

#[test]
fn test_review_count_is_required_when_reviews_are_on() {
    let mut context = ValidationContext::new();
    BranchProtectionRule::from_model_value(&json!({
        "pattern": "main",
        "requires_approving_reviews": true
    }))
    .unwrap()
    .validate(&mut context, None);
    assert_eq!(context.error_count(), 1);
}

#[test]
fn test_force_pushes_and_bypass_allowances_conflict() {
    let mut context = ValidationContext::new();
    BranchProtectionRule::from_model_value(&json!({
        "pattern": "main",
        "allows_force_pushes": true,
        "bypass_force_push_allowances": ["@octocat"]
    }))
    .unwrap()
    .validate(&mut context, None);
    assert_eq!(context.error_count(), 1);
}

#[test]
fn test_push_restrictions_without_gate_warn() {
    let mut context = ValidationContext::new();
    BranchProtectionRule::from_model_value(&json!({
        "pattern": "main",
        "restricts_pushes": false,
        "push_restrictions": ["@octo/core"]
    }))
    .unwrap()
    .validate(&mut context, None);
    assert_eq!(context.warning_count(), 1);
}

#[test]
fn test_status_check_encoding_round_trip() {
    let rule = BranchProtectionRule::from_provider_data(&json!({
        "pattern": "main",
        "requiredStatusChecks": [
            {"app": {"slug": "ci"}, "context": "unit"},
            {"app": null, "context": "manual"}
        ]
    }))
    .unwrap();

    let map = rule.to_model_map();
    assert_eq!(map["required_status_checks"], json!(["ci:unit", "any:manual"]));
}
