//! Tests for the repository entity.

use serde_json::json;

use super::*;
use crate::organization_settings::OrganizationSettings;

fn org_settings(data: serde_json::Value) -> OrganizationSettings {
    OrganizationSettings::from_model_value(&data).unwrap()
}

fn test_provider() -> github_client::GitHubProvider {
    github_client::GitHubProvider::from_octocrab(
        octocrab::Octocrab::builder().build().unwrap(),
        None,
    )
}

#[test]
fn test_provider_mapping_flattens_nested_blocks() {
    let repository = Repository::from_provider_data(&json!({
        "id": 42,
        "node_id": "R_42",
        "name": "api",
        "private": false,
        "archived": false,
        "template_repository": {"full_name": "octo/template"},
        "parent": {"full_name": "upstream/api"},
        "security_and_analysis": {
            "secret_scanning": {"status": "enabled"},
            "secret_scanning_push_protection": {"status": "disabled"}
        },
        "gh_pages": {"build_type": "workflow", "source": {"branch": "main", "path": "/docs"}},
        "code_scanning_default_setup": {
            "state": "configured",
            "query_suite": "default",
            "languages": ["rust"]
        },
        "topics": ["rust", "api"],
        "dependabot_alerts_enabled": true
    }))
    .unwrap();

    assert_eq!(repository.template_repository.as_deref(), Some("octo/template"));
    assert_eq!(repository.forked_repository.as_deref(), Some("upstream/api"));
    assert_eq!(repository.secret_scanning.as_deref(), Some("enabled"));
    assert_eq!(repository.gh_pages_build_type.as_deref(), Some("workflow"));
    assert_eq!(repository.gh_pages_source_branch.as_deref(), Some("main"));
    assert_eq!(repository.code_scanning_default_setup_enabled.cloned_value(), Some(true));
    assert_eq!(
        repository.topics.cloned_value(),
        Some(vec!["rust".to_string(), "api".to_string()])
    );
}

#[test]
fn test_missing_pages_block_reads_as_disabled() {
    let repository = Repository::from_provider_data(&json!({"name": "api"})).unwrap();
    assert_eq!(repository.gh_pages_build_type.as_deref(), Some("disabled"));
}

#[tokio::test]
async fn test_security_block_maps_back_for_public_repos() {
    let repository = Repository::from_model_value(&json!({
        "name": "api",
        "private": false,
        "secret_scanning": "enabled"
    }))
    .unwrap();

    let body = repository.to_provider_body("octo", &test_provider()).await.unwrap();
    assert_eq!(
        body["security_and_analysis"],
        json!({"secret_scanning": {"status": "enabled"}})
    );
}

#[tokio::test]
async fn test_security_block_is_suppressed_for_private_repos() {
    let repository = Repository::from_model_value(&json!({
        "name": "internal",
        "private": true,
        "secret_scanning": "enabled"
    }))
    .unwrap();

    let body = repository.to_provider_body("octo", &test_provider()).await.unwrap();
    assert!(!body.contains_key("security_and_analysis"));
}

#[test]
fn test_security_fields_do_not_diff_on_private_repos() {
    let expected = Repository::from_model_value(&json!({
        "name": "internal",
        "private": true,
        "secret_scanning": "enabled"
    }))
    .unwrap();
    let current = Repository::from_model_value(&json!({"name": "internal", "private": true})).unwrap();

    assert!(expected.difference_from(&current).is_empty());
}

#[test]
fn test_archived_repositories_suppress_merge_settings() {
    let expected = Repository::from_model_value(&json!({
        "name": "old",
        "archived": true,
        "allow_squash_merge": false,
        "description": "kept"
    }))
    .unwrap();
    let current = Repository::from_model_value(&json!({
        "name": "old",
        "archived": true,
        "allow_squash_merge": true,
        "description": "stale"
    }))
    .unwrap();

    let changes = expected.difference_from(&current);
    assert_eq!(changes.len(), 1);
    assert!(changes.contains_key("description"));
}

#[test]
fn test_all_names_include_aliases() {
    let repository = Repository::from_model_value(&json!({
        "name": "new",
        "aliases": ["old", "ancient"]
    }))
    .unwrap();
    assert_eq!(repository.all_names(), vec!["new", "old", "ancient"]);
}

#[test]
fn test_children_are_parsed_from_the_model_tree() {
    let repository = Repository::from_model_value(&json!({
        "name": "api",
        "branch_protection_rules": [{"pattern": "main"}],
        "webhooks": [{"url": "https://a"}],
        "secrets": [{"name": "KEY", "value": "pass:key"}],
        "environments": [{
            "name": "production",
            "secrets": [{"name": "PROD_KEY", "value": "pass:prod"}]
        }],
        "team_permissions": [{"team": "core", "permission": "push"}],
        "workflow_settings": {"enabled": true}
    }))
    .unwrap();

    assert_eq!(repository.branch_protection_rules.len(), 1);
    assert_eq!(repository.webhooks.len(), 1);
    assert_eq!(repository.secrets.len(), 1);
    assert_eq!(repository.environments.len(), 1);
    assert_eq!(repository.environments[0].secrets.len(), 1);
    assert_eq!(repository.team_permissions.len(), 1);
    assert!(repository.workflow_settings.is_some());
}

#[test]
fn test_public_repo_forbidding_forks_warns() {
    let repository = Repository::from_model_value(&json!({
        "name": "api",
        "private": false,
        "allow_forking": false
    }))
    .unwrap();

    let mut context = ValidationContext::new();
    repository.validate(&mut context, &org_settings(json!({})));
    assert_eq!(context.warning_count(), 1);
}

#[test]
fn test_private_fork_policy_conflict_is_an_error() {
    let repository = Repository::from_model_value(&json!({
        "name": "internal",
        "private": true,
        "allow_forking": true
    }))
    .unwrap();

    let mut context = ValidationContext::new();
    repository.validate(
        &mut context,
        &org_settings(json!({"members_can_fork_private_repositories": false})),
    );
    assert_eq!(context.error_count(), 1);
}

#[test]
fn test_signoff_cannot_be_weaker_than_the_organization() {
    let repository = Repository::from_model_value(&json!({
        "name": "api",
        "web_commit_signoff_required": false
    }))
    .unwrap();

    let mut context = ValidationContext::new();
    repository.validate(
        &mut context,
        &org_settings(json!({"web_commit_signoff_required": true})),
    );
    assert_eq!(context.error_count(), 1);
}

#[test]
fn test_push_protection_requires_secret_scanning() {
    let repository = Repository::from_model_value(&json!({
        "name": "api",
        "private": false,
        "secret_scanning": "disabled",
        "secret_scanning_push_protection": "enabled"
    }))
    .unwrap();

    let mut context = ValidationContext::new();
    repository.validate(&mut context, &org_settings(json!({})));
    assert_eq!(context.error_count(), 1);
}

#[test]
fn test_code_scanning_requires_enabled_actions() {
    let repository = Repository::from_model_value(&json!({
        "name": "api",
        "code_scanning_default_setup_enabled": true,
        "workflow_settings": {"enabled": false}
    }))
    .unwrap();

    let mut context = ValidationContext::new();
    repository.validate(&mut context, &org_settings(json!({})));
    assert_eq!(context.error_count(), 1);
}

#[test]
fn test_ruleset_deployment_environments_must_be_declared() {
    let repository = Repository::from_model_value(&json!({
        "name": "api",
        "rulesets": [{
            "name": "deploy-gate",
            "target": "branch",
            "enforcement": "active",
            "required_deployment_environments": ["production"]
        }]
    }))
    .unwrap();

    let mut context = ValidationContext::new();
    repository.validate(&mut context, &org_settings(json!({})));
    assert_eq!(context.error_count(), 1);

    let repository = Repository::from_model_value(&json!({
        "name": "api",
        "environments": [{"name": "production"}],
        "rulesets": [{
            "name": "deploy-gate",
            "target": "branch",
            "enforcement": "active",
            "required_deployment_environments": ["production"]
        }]
    }))
    .unwrap();

    let mut context = ValidationContext::new();
    repository.validate(&mut context, &org_settings(json!({})));
    assert_eq!(context.error_count(), 0);
}

#[test]
fn test_topic_validation() {
    let repository = Repository::from_model_value(&json!({
        "name": "api",
        "topics": ["Valid-Not", "ok-topic"]
    }))
    .unwrap();

    let mut context = ValidationContext::new();
    repository.validate(&mut context, &org_settings(json!({})));
    assert_eq!(context.error_count(), 1);
}
