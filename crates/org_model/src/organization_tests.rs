//! Tests for the organization root entity.

use serde_json::json;

use super::*;
use crate::validation::FailureType;

fn organization(data: serde_json::Value) -> GitHubOrganization {
    GitHubOrganization::from_model_value("octo", &data).unwrap()
}

#[test]
fn test_model_tree_is_parsed_into_collections() {
    let org = organization(json!({
        "settings": {"billing_email": "a@x"},
        "workflow_settings": {"enabled_repositories": "all"},
        "webhooks": [{"url": "https://a"}],
        "secrets": [{"name": "KEY", "value": "pass:key"}],
        "variables": [{"name": "REGION", "value": "eu"}],
        "custom_properties": [{"name": "tier", "value_type": "string"}],
        "roles": [{"name": "auditor"}],
        "rulesets": [{"name": "main", "target": "branch", "enforcement": "active"}],
        "teams": [{"name": "core"}],
        "repositories": [{"name": "api"}]
    }));

    assert_eq!(org.github_id, "octo");
    assert_eq!(org.webhooks.len(), 1);
    assert_eq!(org.secrets.len(), 1);
    assert_eq!(org.variables.len(), 1);
    assert_eq!(org.custom_properties.len(), 1);
    assert_eq!(org.roles.len(), 1);
    assert_eq!(org.rulesets.len(), 1);
    assert_eq!(org.teams.len(), 1);
    assert_eq!(org.repositories.len(), 1);
    assert_eq!(org.webhooks[0].scope, crate::webhook::WebhookScope::Organization);
}

#[test]
fn test_to_model_value_round_trip() {
    let data = json!({
        "settings": {"billing_email": "a@x"},
        "webhooks": [{"url": "https://a", "active": true}],
        "repositories": [{
            "name": "api",
            "private": false,
            "webhooks": [{"url": "https://repo-hook"}],
            "environments": [{
                "name": "production",
                "variables": [{"name": "TIER", "value": "prod"}]
            }]
        }]
    });

    let rendered = organization(data).to_model_value();
    let reparsed = GitHubOrganization::from_model_value("octo", &rendered).unwrap();

    assert_eq!(reparsed.webhooks[0].url.as_deref(), Some("https://a"));
    assert_eq!(reparsed.repositories[0].webhooks.len(), 1);
    assert_eq!(reparsed.repositories[0].environments[0].variables.len(), 1);
}

#[test]
fn test_duplicate_keys_are_rejected() {
    let org = organization(json!({
        "webhooks": [{"url": "https://a"}, {"url": "https://a"}]
    }));
    let context = org.validate();
    assert_eq!(context.error_count(), 1);
}

#[test]
fn test_alias_collision_with_primary_key_is_rejected() {
    let org = organization(json!({
        "repositories": [
            {"name": "api"},
            {"name": "api-v2", "aliases": ["api"]}
        ]
    }));
    let context = org.validate();
    assert_eq!(context.error_count(), 1);
}

#[test]
fn test_unmatched_ruleset_repo_glob_warns() {
    let org = organization(json!({
        "rulesets": [{
            "name": "main",
            "target": "branch",
            "enforcement": "active",
            "include_repo_names": ["mobile-*"]
        }],
        "repositories": [{"name": "api"}]
    }));

    let context = org.validate();
    assert_eq!(context.warning_count(), 1);
    assert!(context.failures()[0].1.contains("mobile-*"));
}

#[test]
fn test_matching_ruleset_repo_glob_is_silent() {
    let org = organization(json!({
        "rulesets": [{
            "name": "main",
            "target": "branch",
            "enforcement": "active",
            "include_repo_names": ["api*"]
        }],
        "repositories": [{"name": "api"}, {"name": "api-v2"}]
    }));

    let context = org.validate();
    assert_eq!(context.warning_count(), 0);
    assert_eq!(context.error_count(), 0);
}

#[test]
fn test_validation_walks_the_whole_tree() {
    let org = organization(json!({
        "repositories": [{
            "name": "api",
            "webhooks": [{"url": "https://a", "content_type": "xml"}],
            "environments": [{"name": "production", "wait_timer": -2}]
        }]
    }));

    let context = org.validate();
    assert_eq!(context.count(FailureType::Error), 2);
}
