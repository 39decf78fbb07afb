//! Tests for app and token introspection.

use serde_json::json;
use wiremock::matchers::{method, path};
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
async fn test_app_and_user_id_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apps/ci-bot"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": 77, "node_id": "A_77"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": 583231, "node_id": "U_1"})),
        )
        .mount(&server)
        .await;

    let client = rest_client(&server).await;
    assert_eq!(client.get_app_ids("ci-bot").await.unwrap(), (77, "A_77".to_string()));
    assert_eq!(
        client.get_user_ids("octocat").await.unwrap(),
        (583231, "U_1".to_string())
    );
}

#[tokio::test]
async fn test_token_scopes_come_from_response_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-oauth-scopes", "repo, admin:org, workflow")
                .set_body_json(json!({"login": "octocat"})),
        )
        .mount(&server)
        .await;

    let client = rest_client(&server).await;
    let scopes = client.get_token_scopes().await.unwrap();
    assert_eq!(scopes, vec!["repo", "admin:org", "workflow"]);
}
