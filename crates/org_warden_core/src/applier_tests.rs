//! Tests for the patch applier, against a mock provider.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use org_model::{
    BranchProtectionRule, FieldChange, LivePatch, ModelObject, OrganizationSettings, ParentRef,
    Secret, SecretScope, Webhook, WebhookScope,
};

use super::*;
use crate::printer::IndentingPrinter;

fn quiet_printer() -> IndentingPrinter {
    IndentingPrinter::new(Box::new(std::io::sink()), 0)
}

async fn provider(server: &MockServer) -> github_client::GitHubProvider {
    let octocrab = octocrab::Octocrab::builder()
        .base_uri(server.uri())
        .unwrap()
        .personal_token("test-token".to_string())
        .build()
        .unwrap();
    github_client::GitHubProvider::from_octocrab(octocrab, None)
}

fn settings_change_patch() -> LivePatch {
    let expected =
        OrganizationSettings::from_model_value(&json!({"billing_email": "a@x"})).unwrap();
    let current = OrganizationSettings::from_model_value(&json!({"billing_email": "b@x"})).unwrap();
    let changes = expected.difference_from(&current);
    LivePatch::changes(Arc::new(expected), Arc::new(current), changes, None, false)
}

fn webhook_removal_patch() -> LivePatch {
    let current = Webhook::from_provider_data(
        WebhookScope::Organization,
        &json!({"id": 7, "config": {"url": "https://old"}}),
    )
    .unwrap();
    LivePatch::deletion(Arc::new(current), None)
}

#[tokio::test]
async fn test_settings_change_issues_a_single_patch_request() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/orgs/octo"))
        .and(body_partial_json(json!({"billing_email": "a@x"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server).await;
    let patches = vec![settings_change_patch()];

    let status = apply_patches(
        &patches,
        "octo",
        &provider,
        &ApplyOptions::default(),
        &CancellationFlag::new(),
        &mut quiet_printer(),
    )
    .await;

    assert_eq!(status.differences, 1);
    assert_eq!(status.failures, 0);
}

#[tokio::test]
async fn test_removals_are_gated_by_delete_resources() {
    let server = MockServer::start().await;
    // no DELETE mock mounted: any call would fail the request count

    let provider = provider(&server).await;
    let patches = vec![webhook_removal_patch()];

    let status = apply_patches(
        &patches,
        "octo",
        &provider,
        &ApplyOptions::default(),
        &CancellationFlag::new(),
        &mut quiet_printer(),
    )
    .await;

    assert_eq!(status.deletions, 0);
    assert_eq!(status.skipped_deletions, 1);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_removals_execute_with_delete_resources() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/orgs/octo/hooks/7"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server).await;
    let patches = vec![webhook_removal_patch()];

    let options = ApplyOptions {
        delete_resources: true,
        continue_on_error: false,
    };
    let status = apply_patches(
        &patches,
        "octo",
        &provider,
        &options,
        &CancellationFlag::new(),
        &mut quiet_printer(),
    )
    .await;

    assert_eq!(status.deletions, 1);
}

#[tokio::test]
async fn test_failed_patch_aborts_without_continue_on_error() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/orgs/octo"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"message": "Validation Failed"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/orgs/octo/hooks/7"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let provider = provider(&server).await;
    let patches = vec![settings_change_patch(), webhook_removal_patch()];

    let options = ApplyOptions {
        delete_resources: true,
        continue_on_error: false,
    };
    let status = apply_patches(
        &patches,
        "octo",
        &provider,
        &options,
        &CancellationFlag::new(),
        &mut quiet_printer(),
    )
    .await;

    assert_eq!(status.failures, 1);
    assert_eq!(status.deletions, 0);
    assert_eq!(status.exit_code(), crate::errors::exit_codes::OPERATION_FAILED);
}

#[tokio::test]
async fn test_failed_patch_continues_in_continue_on_error_mode() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/orgs/octo"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"message": "Validation Failed"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/orgs/octo/hooks/7"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server).await;
    let patches = vec![settings_change_patch(), webhook_removal_patch()];

    let options = ApplyOptions {
        delete_resources: true,
        continue_on_error: true,
    };
    let status = apply_patches(
        &patches,
        "octo",
        &provider,
        &options,
        &CancellationFlag::new(),
        &mut quiet_printer(),
    )
    .await;

    assert_eq!(status.failures, 1);
    assert_eq!(status.deletions, 1);
}

#[tokio::test]
async fn test_secret_references_resolve_just_before_the_write() {
    let server = MockServer::start().await;
    // any 32 byte value is a usable sealed-box public key
    Mock::given(method("GET"))
        .and(path("/orgs/octo/actions/secrets/public-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "key_id": "568250167242549743",
            "key": "AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE="
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/orgs/octo/actions/secrets/KEY"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    // the inline provider resolves "plain:<value>" to "<value>"
    let secret = Secret::from_model_value(
        SecretScope::Organization,
        &json!({"name": "KEY", "value": "plain:s3cret-value", "visibility": "public"}),
    )
    .unwrap();
    let patches = vec![LivePatch::addition(Arc::new(secret), None)];

    let provider = provider(&server).await;
    let status = apply_patches(
        &patches,
        "octo",
        &provider,
        &ApplyOptions::default(),
        &CancellationFlag::new(),
        &mut quiet_printer(),
    )
    .await;

    assert_eq!(status.additions, 1);
    assert_eq!(status.failures, 0);

    // the sealed body carries neither the reference nor the plaintext
    let requests = server.received_requests().await.unwrap();
    let put = requests
        .iter()
        .find(|request| request.method.as_str() == "PUT")
        .unwrap();
    let body = String::from_utf8_lossy(&put.body);
    assert!(!body.contains("plain:s3cret-value"));
    assert!(!body.contains("s3cret-value"));
}

#[tokio::test]
async fn test_unresolvable_reference_fails_only_that_patch() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/orgs/octo/hooks/7"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let secret = Secret::from_model_value(
        SecretScope::Organization,
        &json!({"name": "KEY", "value": "vault:stale/entry"}),
    )
    .unwrap();
    let patches = vec![
        LivePatch::addition(Arc::new(secret), None),
        webhook_removal_patch(),
    ];

    let provider = provider(&server).await;
    let options = ApplyOptions {
        delete_resources: true,
        continue_on_error: true,
    };
    let status = apply_patches(
        &patches,
        "octo",
        &provider,
        &options,
        &CancellationFlag::new(),
        &mut quiet_printer(),
    )
    .await;

    // the unknown credential provider fails the secret patch, the
    // following removal still runs
    assert_eq!(status.failures, 1);
    assert_eq!(status.additions, 0);
    assert_eq!(status.deletions, 1);
}

#[tokio::test]
async fn test_unresolvable_reference_aborts_without_continue_on_error() {
    let server = MockServer::start().await;

    let secret = Secret::from_model_value(
        SecretScope::Organization,
        &json!({"name": "KEY", "value": "vault:stale/entry"}),
    )
    .unwrap();
    let patches = vec![
        LivePatch::addition(Arc::new(secret), None),
        settings_change_patch(),
    ];

    let provider = provider(&server).await;
    let status = apply_patches(
        &patches,
        "octo",
        &provider,
        &ApplyOptions::default(),
        &CancellationFlag::new(),
        &mut quiet_printer(),
    )
    .await;

    assert_eq!(status.failures, 1);
    assert_eq!(status.differences, 0);
    // no provider traffic happened at all
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancellation_stops_between_patches() {
    let server = MockServer::start().await;
    let provider = provider(&server).await;

    let cancellation = CancellationFlag::new();
    cancellation.cancel();

    let patches = vec![settings_change_patch()];
    let status = apply_patches(
        &patches,
        "octo",
        &provider,
        &ApplyOptions::default(),
        &cancellation,
        &mut quiet_printer(),
    )
    .await;

    assert_eq!(status.differences, 0);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_branch_protection_change_resolves_actors_into_the_mutation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orgs/octo/teams/core"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 2, "node_id": "T_2"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(wiremock::matchers::body_string_contains("updateBranchProtectionRule"))
        .and(wiremock::matchers::body_string_contains("BPR_1"))
        .and(wiremock::matchers::body_string_contains("T_2"))
        .and(wiremock::matchers::body_string_contains("restrictsPushes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"updateBranchProtectionRule": {"branchProtectionRule": {"pattern": "main"}}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let expected = BranchProtectionRule::from_model_value(&json!({
        "pattern": "main",
        "push_restrictions": ["@octo/core"]
    }))
    .unwrap();
    let current = BranchProtectionRule::from_provider_data(&json!({
        "id": "BPR_1",
        "pattern": "main",
        "push_restrictions": []
    }))
    .unwrap();
    let changes = expected.difference_from(&current);
    assert!(changes.contains_key("push_restrictions"));

    let parent = ParentRef::repository("api").with_node_id("R_42");
    let patch = LivePatch::changes(
        Arc::new(expected),
        Arc::new(current),
        changes,
        Some(parent),
        false,
    );

    let provider = provider(&server).await;
    let status = apply_patches(
        &[patch],
        "octo",
        &provider,
        &ApplyOptions::default(),
        &CancellationFlag::new(),
        &mut quiet_printer(),
    )
    .await;
    assert_eq!(status.differences, 1);
    assert_eq!(status.failures, 0);
}

#[tokio::test]
async fn test_forced_webhook_change_writes_the_full_record() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/orgs/octo/hooks/9"))
        .and(body_partial_json(json!({
            "active": true,
            "config": {"url": "https://a", "secret": "resolved-secret"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let expected = Webhook::from_model_value(
        WebhookScope::Organization,
        &json!({"url": "https://a", "active": true, "secret": "resolved-secret"}),
    )
    .unwrap();
    let current = Webhook::from_provider_data(
        WebhookScope::Organization,
        &json!({"id": 9, "config": {"url": "https://a"}}),
    )
    .unwrap();
    let changes = expected.forced_changes();
    assert!(changes.values().all(|change: &FieldChange| change.from == change.to));

    let patch = LivePatch::changes(Arc::new(expected), Arc::new(current), changes, None, true);
    let provider = provider(&server).await;

    let status = apply_patches(
        &[patch],
        "octo",
        &provider,
        &ApplyOptions::default(),
        &CancellationFlag::new(),
        &mut quiet_printer(),
    )
    .await;
    assert_eq!(status.differences, 1);
    assert_eq!(status.failures, 0);
}
