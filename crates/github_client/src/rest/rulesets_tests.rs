//! Tests for ruleset endpoints.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::rest::RestClient;

async fn rest_client(server: &MockServer) -> RestClient {
    let octocrab = octocrab::Octocrab::builder()
        .base_uri(server.uri())
        .unwrap()
        .personal_token("test-token".to_string())
        .build()
        .unwrap();
    RestClient::new(octocrab)
}

#[tokio::test]
async fn test_org_rulesets_are_fetched_in_full_detail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orgs/octo/rulesets"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": 11, "name": "protect-main"}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orgs/octo/rulesets/11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 11,
            "name": "protect-main",
            "target": "branch",
            "enforcement": "active",
            "rules": [{"type": "deletion"}]
        })))
        .mount(&server)
        .await;

    let client = rest_client(&server).await;
    let rulesets = client.get_org_rulesets("octo").await.unwrap();
    assert_eq!(rulesets.len(), 1);
    assert_eq!(rulesets[0]["rules"][0]["type"], "deletion");
}

#[tokio::test]
async fn test_repo_rulesets_exclude_inherited_ones() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/api/rulesets"))
        .and(query_param("includes_parents", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = rest_client(&server).await;
    let rulesets = client.get_repo_rulesets("octo", "api").await.unwrap();
    assert!(rulesets.is_empty());
}

#[tokio::test]
async fn test_ruleset_update_uses_put() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/orgs/octo/rulesets/11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = rest_client(&server).await;
    client
        .update_org_ruleset("octo", 11, &json!({"enforcement": "disabled"}))
        .await
        .unwrap();
}
