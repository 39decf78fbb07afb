//! Tests for the team entity.

use serde_json::json;

use super::*;

fn test_provider() -> github_client::GitHubProvider {
    github_client::GitHubProvider::from_octocrab(
        octocrab::Octocrab::builder().build().unwrap(),
        None,
    )
}

#[test]
fn test_provider_privacy_and_notifications_are_translated() {
    let team = Team::from_provider_data(&json!({
        "id": 17,
        "slug": "core",
        "name": "Core",
        "privacy": "closed",
        "notification_setting": "notifications_enabled",
        "members": ["alice", "bob"]
    }))
    .unwrap();

    assert_eq!(team.privacy.as_deref(), Some("visible"));
    assert_eq!(team.notifications.cloned_value(), Some(true));
    assert_eq!(team.slug.as_deref(), Some("core"));
}

#[tokio::test]
async fn test_model_privacy_and_notifications_are_translated_back() {
    let team = Team::from_model_value(&json!({
        "name": "Core",
        "privacy": "visible",
        "notifications": false,
        "members": ["alice"]
    }))
    .unwrap();

    let body = team.to_provider_body("octo", &test_provider()).await.unwrap();
    assert_eq!(body["privacy"], json!("closed"));
    assert_eq!(body["notification_setting"], json!("notifications_disabled"));
    // membership is synchronized separately
    assert!(!body.contains_key("members"));
}

#[test]
fn test_round_trip_preserves_writable_fields() {
    let original = Team::from_model_value(&json!({
        "name": "Core",
        "description": "the core team",
        "privacy": "secret",
        "notifications": true
    }))
    .unwrap();

    let provider_shape = json!({
        "name": "Core",
        "description": "the core team",
        "privacy": "secret",
        "notification_setting": "notifications_enabled"
    });
    let round_tripped = Team::from_provider_data(&provider_shape).unwrap();
    assert!(original.difference_from(&round_tripped).is_empty());
}

#[test]
fn test_skip_members_suppresses_membership_diff() {
    let expected = Team::from_model_value(&json!({
        "name": "Core",
        "skip_members": true,
        "members": []
    }))
    .unwrap();
    let current = Team::from_provider_data(&json!({
        "name": "Core",
        "members": ["alice", "bob"]
    }))
    .unwrap();

    assert!(expected.difference_from(&current).is_empty());
}

#[test]
fn test_validation_rejects_unknown_privacy() {
    let mut context = ValidationContext::new();
    Team::from_model_value(&json!({"name": "Core", "privacy": "closed"}))
        .unwrap()
        .validate(&mut context, None);
    // the provider's name for visible teams is not part of the model
    assert_eq!(context.error_count(), 1);
}

#[test]
fn test_validation_warns_when_skipped_members_are_listed() {
    let mut context = ValidationContext::new();
    Team::from_model_value(&json!({
        "name": "Core",
        "skip_members": true,
        "members": ["alice"]
    }))
    .unwrap()
    .validate(&mut context, None);
    assert_eq!(context.warning_count(), 1);
}
