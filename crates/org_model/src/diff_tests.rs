//! Tests for the diff engine.

use serde_json::json;

use super::*;
use crate::livepatch::PatchContext;
use crate::organization::GitHubOrganization;

fn organization(data: serde_json::Value) -> GitHubOrganization {
    GitHubOrganization::from_model_value("octo", &data).unwrap()
}

fn forced_context(filter: &str) -> PatchContext {
    PatchContext {
        update_webhooks: true,
        update_secrets: true,
        update_filter: regex::Regex::new(filter).unwrap(),
    }
}

#[test]
fn test_identity_produces_no_patches() {
    let data = json!({
        "settings": {"billing_email": "a@x", "web_commit_signoff_required": false},
        "workflow_settings": {"enabled_repositories": "all"},
        "webhooks": [{"url": "https://a", "active": true}],
        "secrets": [{"name": "KEY", "visibility": "public"}],
        "variables": [{"name": "REGION", "value": "eu", "visibility": "public"}],
        "teams": [{"name": "core", "privacy": "visible"}],
        "repositories": [{
            "name": "api",
            "private": false,
            "branch_protection_rules": [{"pattern": "main"}],
            "environments": [{"name": "production", "wait_timer": 0}]
        }]
    });

    let patches = generate_live_patches(
        &organization(data.clone()),
        &organization(data),
        &PatchContext::default(),
    );
    assert!(patches.is_empty(), "unexpected patches: {patches:?}");
}

#[test]
fn test_billing_email_change_produces_one_settings_patch() {
    let expected = organization(json!({"settings": {"billing_email": "a@x"}}));
    let current = organization(json!({"settings": {"billing_email": "b@x"}}));

    let patches = generate_live_patches(&expected, &current, &PatchContext::default());
    assert_eq!(patches.len(), 1);

    match &patches[0] {
        LivePatch::Change { changes, forced, .. } => {
            assert!(!forced);
            assert_eq!(changes.len(), 1);
            assert_eq!(changes["billing_email"].from, json!("b@x"));
            assert_eq!(changes["billing_email"].to, json!("a@x"));
        }
        other => panic!("expected a change patch, got {other:?}"),
    }
}

#[test]
fn test_unset_fields_never_appear_in_patches() {
    // the expected side only pins billing_email; every other current
    // value must be left alone
    let expected = organization(json!({"settings": {"billing_email": "a@x"}}));
    let current = organization(json!({
        "settings": {
            "billing_email": "a@x",
            "description": "live description",
            "web_commit_signoff_required": true
        }
    }));

    let patches = generate_live_patches(&expected, &current, &PatchContext::default());
    assert!(patches.is_empty());
}

#[test]
fn test_dummy_secret_suppresses_all_patches() {
    let expected = organization(json!({
        "webhooks": [{"url": "https://a", "active": false, "secret": "********"}],
        "secrets": [{"name": "KEY", "value": "****"}]
    }));
    let current = organization(json!({
        "webhooks": [{"url": "https://a", "active": true}],
        "secrets": [{"name": "KEY"}]
    }));

    // value differences behind a dummy secret are not acted upon
    let patches = generate_live_patches(&expected, &current, &PatchContext::default());
    assert!(patches.is_empty());

    // dummies are not even added when missing on the current side
    let patches = generate_live_patches(
        &expected,
        &organization(json!({})),
        &PatchContext::default(),
    );
    assert!(patches.is_empty());
}

#[test]
fn test_forced_webhook_update_covers_every_field() {
    let expected = organization(json!({
        "webhooks": [{
            "url": "https://a",
            "active": true,
            "events": ["push"],
            "content_type": "json",
            "secret": "pass:hook"
        }]
    }));
    let current = organization(json!({
        "webhooks": [{
            "url": "https://a",
            "active": true,
            "events": ["push"],
            "content_type": "json"
        }]
    }));

    let patches = generate_live_patches(&expected, &current, &forced_context(".*"));
    assert_eq!(patches.len(), 1);

    match &patches[0] {
        LivePatch::Change { changes, forced, .. } => {
            assert!(forced);
            for field in ["url", "active", "events", "content_type", "secret"] {
                let change = &changes[field];
                assert_eq!(change.from, change.to);
            }
        }
        other => panic!("expected a forced change, got {other:?}"),
    }
}

#[test]
fn test_forced_update_honors_the_filter() {
    let expected = organization(json!({
        "webhooks": [{"url": "https://other.example.com/hook", "secret": "pass:hook"}]
    }));
    let current = organization(json!({
        "webhooks": [{"url": "https://other.example.com/hook", "secret": null}]
    }));

    let patches = generate_live_patches(&expected, &current, &forced_context("^https://ci\\."));
    // the filter does not match, only the ordinary secret-presence diff runs
    assert_eq!(patches.len(), 1);
    match &patches[0] {
        LivePatch::Change { forced, changes, .. } => {
            assert!(!forced);
            assert!(changes.contains_key("secret"));
        }
        other => panic!("expected an ordinary change, got {other:?}"),
    }
}

#[test]
fn test_webhook_rename_via_alias() {
    let expected = organization(json!({
        "webhooks": [{"url": "https://a", "aliases": ["https://b"], "active": true}]
    }));
    let current = organization(json!({
        "webhooks": [{"url": "https://b", "active": true}]
    }));

    let patches = generate_live_patches(&expected, &current, &PatchContext::default());
    assert_eq!(patches.len(), 1);

    match &patches[0] {
        LivePatch::Change { changes, .. } => {
            assert_eq!(changes["url"].from, json!("https://b"));
            assert_eq!(changes["url"].to, json!("https://a"));
        }
        other => panic!("expected a rename change, got {other:?}"),
    }
}

#[test]
fn test_repository_rename_via_alias_produces_single_change() {
    let expected = organization(json!({
        "repositories": [{"name": "new", "aliases": ["old"]}]
    }));
    let current = organization(json!({
        "repositories": [{"name": "old"}]
    }));

    let patches = generate_live_patches(&expected, &current, &PatchContext::default());
    assert_eq!(patches.len(), 1);

    match &patches[0] {
        LivePatch::Change { changes, .. } => {
            assert_eq!(changes["name"].from, json!("old"));
            assert_eq!(changes["name"].to, json!("new"));
        }
        other => panic!("expected a rename change, got {other:?}"),
    }
}

#[test]
fn test_removals_are_counted_but_separate() {
    let expected = organization(json!({}));
    let current = organization(json!({
        "webhooks": [{"url": "https://a"}],
        "repositories": [{"name": "legacy"}]
    }));

    let patches = generate_live_patches(&expected, &current, &PatchContext::default());
    let status = DiffStatus::of(&patches);
    assert_eq!(status.deletions, 2);
    assert_eq!(status.additions, 0);
    assert_eq!(status.differences, 0);
    assert_eq!(status.total_changes(false), 0);
    assert_eq!(status.total_changes(true), 2);
}

#[test]
fn test_new_repository_emits_children_after_the_repository() {
    let expected = organization(json!({
        "repositories": [{
            "name": "fresh",
            "branch_protection_rules": [{"pattern": "main"}],
            "webhooks": [{"url": "https://hook"}],
            "environments": [{
                "name": "production",
                "variables": [{"name": "TIER", "value": "prod"}]
            }]
        }]
    }));
    let current = organization(json!({}));

    let patches = generate_live_patches(&expected, &current, &PatchContext::default());
    let kinds: Vec<&str> = patches.iter().map(|patch| patch.entity().resource_kind()).collect();
    assert_eq!(
        kinds,
        vec![
            "repository",
            "branch_protection_rule",
            "repo_webhook",
            "environment",
            "environment_variable"
        ]
    );
    assert!(patches.iter().all(LivePatch::is_addition));

    // children carry their repository parent
    assert_eq!(
        patches[1].parent().and_then(|parent| parent.repository.as_deref()),
        Some("fresh")
    );
    assert_eq!(
        patches[4].parent().and_then(|parent| parent.environment.as_deref()),
        Some("production")
    );
}

#[test]
fn test_branch_protection_rules_of_archived_repos_are_dropped() {
    let expected = organization(json!({
        "repositories": [{
            "name": "frozen",
            "archived": true,
            "branch_protection_rules": [{"pattern": "main"}]
        }]
    }));
    let current = organization(json!({
        "repositories": [{"name": "frozen", "archived": true}]
    }));

    let patches = generate_live_patches(&expected, &current, &PatchContext::default());
    assert!(patches.is_empty());
}

#[test]
fn test_org_projects_disabled_drops_per_repo_has_projects() {
    let expected = organization(json!({
        "settings": {"has_organization_projects": false},
        "repositories": [{"name": "api", "has_projects": true}]
    }));
    let current = organization(json!({
        "settings": {"has_organization_projects": false},
        "repositories": [{"name": "api", "has_projects": false}]
    }));

    let patches = generate_live_patches(&expected, &current, &PatchContext::default());
    assert!(patches.is_empty());
}

#[test]
fn test_org_signoff_enable_propagates_to_current_repos() {
    let expected = organization(json!({
        "settings": {"web_commit_signoff_required": true},
        "repositories": [{"name": "api", "web_commit_signoff_required": true}]
    }));
    let current = organization(json!({
        "settings": {"web_commit_signoff_required": false},
        "repositories": [{"name": "api", "web_commit_signoff_required": false}]
    }));

    let patches = generate_live_patches(&expected, &current, &PatchContext::default());
    // only the organization-level change remains, the repository follows
    // implicitly
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].entity().resource_kind(), "org_settings");
}

#[test]
fn test_org_disabled_actions_coerce_only_the_enabled_field() {
    // the organization disables actions outright; the per-repo switch is
    // meaningless, but other workflow drift must still surface
    let expected = organization(json!({
        "workflow_settings": {"enabled_repositories": "none"},
        "repositories": [{
            "name": "api",
            "workflow_settings": {"enabled": true, "default_workflow_permissions": "write"}
        }]
    }));
    let current = organization(json!({
        "workflow_settings": {"enabled_repositories": "none"},
        "repositories": [{
            "name": "api",
            "workflow_settings": {"enabled": false, "default_workflow_permissions": "read"}
        }]
    }));

    let patches = generate_live_patches(&expected, &current, &PatchContext::default());
    assert_eq!(patches.len(), 1);
    match &patches[0] {
        LivePatch::Change { changes, .. } => {
            assert!(!changes.contains_key("enabled"));
            assert!(changes.contains_key("default_workflow_permissions"));
        }
        other => panic!("expected a workflow settings change, got {other:?}"),
    }
}

#[test]
fn test_org_selected_actions_coerce_enabled_for_unselected_repos() {
    let expected = organization(json!({
        "workflow_settings": {
            "enabled_repositories": "selected",
            "selected_repositories": ["other"]
        },
        "repositories": [{
            "name": "api",
            "workflow_settings": {"enabled": true}
        }]
    }));
    let current = organization(json!({
        "workflow_settings": {
            "enabled_repositories": "selected",
            "selected_repositories": ["other"]
        },
        "repositories": [{
            "name": "api",
            "workflow_settings": {"enabled": false}
        }]
    }));

    let patches = generate_live_patches(&expected, &current, &PatchContext::default());
    assert!(patches.is_empty());
}

#[test]
fn test_org_selected_actions_keep_enabled_for_selected_repos() {
    let expected = organization(json!({
        "workflow_settings": {
            "enabled_repositories": "selected",
            "selected_repositories": ["api"]
        },
        "repositories": [{
            "name": "api",
            "workflow_settings": {"enabled": true}
        }]
    }));
    let current = organization(json!({
        "workflow_settings": {
            "enabled_repositories": "selected",
            "selected_repositories": ["api"]
        },
        "repositories": [{
            "name": "api",
            "workflow_settings": {"enabled": false}
        }]
    }));

    let patches = generate_live_patches(&expected, &current, &PatchContext::default());
    assert_eq!(patches.len(), 1);
    match &patches[0] {
        LivePatch::Change { changes, .. } => {
            assert!(changes.contains_key("enabled"));
        }
        other => panic!("expected a workflow settings change, got {other:?}"),
    }
}

#[test]
fn test_org_actions_restriction_coerces_repo_allowed_actions() {
    // the organization already restricts at least as much as the repo
    // asks for, the override and its sub-fields are dropped
    let expected = organization(json!({
        "workflow_settings": {"enabled_repositories": "all", "allowed_actions": "selected"},
        "repositories": [{
            "name": "api",
            "workflow_settings": {"enabled": true, "allowed_actions": "all"}
        }]
    }));
    let current = organization(json!({
        "workflow_settings": {"enabled_repositories": "all", "allowed_actions": "selected"},
        "repositories": [{
            "name": "api",
            "workflow_settings": {"enabled": true, "allowed_actions": "local_only"}
        }]
    }));

    let patches = generate_live_patches(&expected, &current, &PatchContext::default());
    assert!(patches.is_empty());
}

#[test]
fn test_repo_allowed_actions_diff_when_org_is_less_restricted() {
    let expected = organization(json!({
        "workflow_settings": {"enabled_repositories": "all", "allowed_actions": "all"},
        "repositories": [{
            "name": "api",
            "workflow_settings": {"enabled": true, "allowed_actions": "selected"}
        }]
    }));
    let current = organization(json!({
        "workflow_settings": {"enabled_repositories": "all", "allowed_actions": "all"},
        "repositories": [{
            "name": "api",
            "workflow_settings": {"enabled": true, "allowed_actions": "local_only"}
        }]
    }));

    let patches = generate_live_patches(&expected, &current, &PatchContext::default());
    assert_eq!(patches.len(), 1);
    match &patches[0] {
        LivePatch::Change { changes, .. } => {
            assert!(changes.contains_key("allowed_actions"));
        }
        other => panic!("expected a workflow settings change, got {other:?}"),
    }
}

#[test]
fn test_org_read_only_workflow_permissions_coerce_the_repo_override() {
    let expected = organization(json!({
        "workflow_settings": {"enabled_repositories": "all", "default_workflow_permissions": "read"},
        "repositories": [{
            "name": "api",
            "workflow_settings": {"enabled": true, "default_workflow_permissions": "write"}
        }]
    }));
    let current = organization(json!({
        "workflow_settings": {"enabled_repositories": "all", "default_workflow_permissions": "read"},
        "repositories": [{
            "name": "api",
            "workflow_settings": {"enabled": true, "default_workflow_permissions": "read"}
        }]
    }));

    let patches = generate_live_patches(&expected, &current, &PatchContext::default());
    assert!(patches.is_empty());
}

#[test]
fn test_org_disabled_review_approvals_coerce_the_repo_override() {
    let expected = organization(json!({
        "workflow_settings": {
            "enabled_repositories": "all",
            "actions_can_approve_pull_request_reviews": false
        },
        "repositories": [{
            "name": "api",
            "workflow_settings": {"enabled": true, "actions_can_approve_pull_request_reviews": true}
        }]
    }));
    let current = organization(json!({
        "workflow_settings": {
            "enabled_repositories": "all",
            "actions_can_approve_pull_request_reviews": false
        },
        "repositories": [{
            "name": "api",
            "workflow_settings": {"enabled": true, "actions_can_approve_pull_request_reviews": false}
        }]
    }));

    let patches = generate_live_patches(&expected, &current, &PatchContext::default());
    assert!(patches.is_empty());
}

#[test]
fn test_gh_pages_source_fields_travel_together() {
    let expected = organization(json!({
        "repositories": [{
            "name": "site",
            "gh_pages_source_branch": "main",
            "gh_pages_source_path": "/docs"
        }]
    }));
    let current = organization(json!({
        "repositories": [{
            "name": "site",
            "gh_pages_source_branch": "gh-pages",
            "gh_pages_source_path": "/docs"
        }]
    }));

    let patches = generate_live_patches(&expected, &current, &PatchContext::default());
    assert_eq!(patches.len(), 1);
    match &patches[0] {
        LivePatch::Change { changes, .. } => {
            assert!(changes.contains_key("gh_pages_source_branch"));
            assert!(changes.contains_key("gh_pages_source_path"));
        }
        other => panic!("expected a change patch, got {other:?}"),
    }
}

#[test]
fn test_component_ordering_is_fixed() {
    let expected = organization(json!({
        "settings": {"billing_email": "a@x"},
        "custom_properties": [{"name": "tier", "value_type": "string"}],
        "roles": [{"name": "auditor"}],
        "rulesets": [{"name": "main", "target": "branch", "enforcement": "active"}],
        "teams": [{"name": "core"}],
        "webhooks": [{"url": "https://a"}],
        "secrets": [{"name": "KEY", "value": "pass:key"}],
        "variables": [{"name": "REGION", "value": "eu"}],
        "repositories": [{"name": "api"}]
    }));
    let current = organization(json!({"settings": {"billing_email": "b@x"}}));

    let patches = generate_live_patches(&expected, &current, &PatchContext::default());
    let kinds: Vec<&str> = patches.iter().map(|patch| patch.entity().resource_kind()).collect();
    assert_eq!(
        kinds,
        vec![
            "org_settings",
            "custom_property",
            "org_role",
            "org_ruleset",
            "team",
            "org_webhook",
            "org_secret",
            "org_variable",
            "repository"
        ]
    );
}

#[test]
fn test_additions_are_sorted_by_key() {
    let expected = organization(json!({
        "webhooks": [
            {"url": "https://zeta"},
            {"url": "https://alpha"}
        ]
    }));
    let current = organization(json!({}));

    let patches = generate_live_patches(&expected, &current, &PatchContext::default());
    let urls: Vec<Option<String>> = patches.iter().map(|patch| patch.entity().key_value()).collect();
    assert_eq!(
        urls,
        vec![
            Some("https://alpha".to_string()),
            Some("https://zeta".to_string())
        ]
    );
}

#[test]
fn test_secret_presence_change_is_reported() {
    let expected = organization(json!({
        "webhooks": [{"url": "https://a", "secret": null}]
    }));
    let current = organization(json!({
        "webhooks": [{"url": "https://a", "secret": "********"}]
    }));

    let patches = generate_live_patches(&expected, &current, &PatchContext::default());
    assert_eq!(patches.len(), 1);
    match &patches[0] {
        LivePatch::Change { changes, .. } => {
            assert_eq!(changes["secret"].to, json!(null));
        }
        other => panic!("expected a change patch, got {other:?}"),
    }
}
