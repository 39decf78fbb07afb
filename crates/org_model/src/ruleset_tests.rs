//! Tests for rulesets and their rules codec.

use serde_json::json;

use super::*;

fn provider_ruleset() -> serde_json::Value {
    json!({
        "id": 11,
        "node_id": "RS_11",
        "name": "protect-main",
        "target": "branch",
        "enforcement": "active",
        "bypass_actors": ["#OrganizationAdmin", "@octo/release:pull_request"],
        "conditions": {
            "ref_name": {"include": ["~DEFAULT_BRANCH"], "exclude": []}
        },
        "rules": [
            {"type": "deletion"},
            {"type": "non_fast_forward"},
            {"type": "required_signatures"},
            {
                "type": "pull_request",
                "parameters": {
                    "required_approving_review_count": 2,
                    "dismiss_stale_reviews_on_push": true,
                    "require_code_owner_review": false,
                    "require_last_push_approval": false,
                    "required_review_thread_resolution": true
                }
            },
            {
                "type": "required_status_checks",
                "parameters": {
                    "strict_required_status_checks_policy": true,
                    "do_not_enforce_on_create": false,
                    "required_status_checks": [
                        {"context": "build", "integration_slug": "github-actions"},
                        {"context": "manual"}
                    ]
                }
            }
        ]
    })
}

#[test]
fn test_rules_decode_into_model_fields() {
    let ruleset =
        Ruleset::from_provider_data(RulesetScope::Organization, &provider_ruleset()).unwrap();

    assert_eq!(ruleset.name.as_deref(), Some("protect-main"));
    assert_eq!(ruleset.allows_deletions.cloned_value(), Some(false));
    assert_eq!(ruleset.allows_force_pushes.cloned_value(), Some(false));
    // no creation/update rule present
    assert_eq!(ruleset.allows_creations.cloned_value(), Some(true));
    assert_eq!(ruleset.allows_updates.cloned_value(), Some(true));
    assert_eq!(ruleset.requires_commit_signatures.cloned_value(), Some(true));
    assert_eq!(ruleset.requires_linear_history.cloned_value(), Some(false));

    let pull_request = ruleset.required_pull_request.value().unwrap();
    assert_eq!(pull_request.required_approving_review_count.cloned_value(), Some(2));
    assert_eq!(pull_request.dismisses_stale_reviews.cloned_value(), Some(true));

    let status_checks = ruleset.required_status_checks.value().unwrap();
    assert_eq!(status_checks.strict.cloned_value(), Some(true));
    assert_eq!(
        status_checks.status_checks.cloned_value(),
        Some(vec!["github-actions:build".to_string(), "any:manual".to_string()])
    );

    // the merge queue rule is absent
    assert!(ruleset.required_merge_queue.is_null());
    assert_eq!(
        ruleset.include_refs.cloned_value(),
        Some(vec!["~DEFAULT_BRANCH".to_string()])
    );
    assert_eq!(
        ruleset.bypass_actors.cloned_value(),
        Some(vec![
            "#OrganizationAdmin".to_string(),
            "@octo/release:pull_request".to_string()
        ])
    );
}

#[test]
fn test_identity_diff_is_empty() {
    let ruleset =
        Ruleset::from_provider_data(RulesetScope::Organization, &provider_ruleset()).unwrap();
    assert!(ruleset.difference_from(&ruleset.clone()).is_empty());
}

#[test]
fn test_embedded_settings_participate_in_diff() {
    let expected = Ruleset::from_model_value(
        RulesetScope::Organization,
        &json!({
            "name": "protect-main",
            "required_pull_request": {"required_approving_review_count": 3}
        }),
    )
    .unwrap();
    let mut provider_shape = provider_ruleset();
    provider_shape["rules"] = json!([{
        "type": "pull_request",
        "parameters": {"required_approving_review_count": 2}
    }]);
    let current = Ruleset::from_provider_data(RulesetScope::Organization, &provider_shape).unwrap();

    let changes = expected.difference_from(&current);
    assert!(changes.contains_key("required_pull_request"));
}

#[test]
fn test_build_rules_inverts_allows_booleans() {
    let ruleset = Ruleset::from_model_value(
        RulesetScope::Repository,
        &json!({
            "name": "no-deletes",
            "allows_deletions": false,
            "allows_creations": true,
            "requires_linear_history": true
        }),
    )
    .unwrap();

    let map = ruleset.to_model_map();
    let rules = Ruleset::build_rules(&map);
    let types: Vec<&str> = rules
        .iter()
        .filter_map(|rule| rule.get("type").and_then(serde_json::Value::as_str))
        .collect();

    assert!(types.contains(&"deletion"));
    assert!(types.contains(&"required_linear_history"));
    assert!(!types.contains(&"creation"));
}

#[test]
fn test_merge_queue_settings_round_trip() {
    let provider_shape = json!({
        "id": 12,
        "name": "queue",
        "target": "branch",
        "enforcement": "active",
        "rules": [{
            "type": "merge_queue",
            "parameters": {
                "merge_method": "SQUASH",
                "grouping_strategy": "ALLGREEN",
                "max_entries_to_build": 5,
                "max_entries_to_merge": 5,
                "min_entries_to_merge": 1,
                "min_entries_to_merge_wait_minutes": 5,
                "check_response_timeout_minutes": 60
            }
        }]
    });

    let ruleset = Ruleset::from_provider_data(RulesetScope::Repository, &provider_shape).unwrap();
    let merge_queue = ruleset.required_merge_queue.value().unwrap();
    assert_eq!(merge_queue.merge_method.as_deref(), Some("SQUASH"));
    assert_eq!(merge_queue.check_response_timeout_minutes.cloned_value(), Some(60));

    let rules = Ruleset::build_rules(&ruleset.to_model_map());
    let queue_rule = rules
        .iter()
        .find(|rule| rule.get("type").and_then(serde_json::Value::as_str) == Some("merge_queue"))
        .unwrap();
    assert_eq!(queue_rule["parameters"]["merge_method"], json!("SQUASH"));
}

#[test]
fn test_enforcement_evaluate_needs_enterprise_plan() {
    let ruleset = Ruleset::from_model_value(
        RulesetScope::Organization,
        &json!({"name": "trial", "target": "branch", "enforcement": "evaluate"}),
    )
    .unwrap();

    let mut context = ValidationContext::new();
    ruleset.validate(&mut context, None, false);
    assert_eq!(context.error_count(), 1);

    let mut context = ValidationContext::new();
    ruleset.validate(&mut context, None, true);
    assert_eq!(context.error_count(), 0);
}

#[test]
fn test_ref_patterns_must_match_target() {
    let ruleset = Ruleset::from_model_value(
        RulesetScope::Organization,
        &json!({
            "name": "tags",
            "target": "tag",
            "enforcement": "active",
            "include_refs": ["refs/heads/main"]
        }),
    )
    .unwrap();

    let mut context = ValidationContext::new();
    ruleset.validate(&mut context, None, false);
    assert_eq!(context.error_count(), 1);
}

#[test]
fn test_special_ref_tokens_are_accepted() {
    let ruleset = Ruleset::from_model_value(
        RulesetScope::Organization,
        &json!({
            "name": "main",
            "target": "branch",
            "enforcement": "active",
            "include_refs": ["~DEFAULT_BRANCH", "refs/heads/release/*"]
        }),
    )
    .unwrap();

    let mut context = ValidationContext::new();
    ruleset.validate(&mut context, None, false);
    assert_eq!(context.error_count(), 0);
}

#[test]
fn test_invalid_bypass_actor_is_rejected() {
    let ruleset = Ruleset::from_model_value(
        RulesetScope::Organization,
        &json!({
            "name": "main",
            "target": "branch",
            "enforcement": "active",
            "bypass_actors": [""]
        }),
    )
    .unwrap();

    let mut context = ValidationContext::new();
    ruleset.validate(&mut context, None, false);
    assert_eq!(context.error_count(), 1);
}
