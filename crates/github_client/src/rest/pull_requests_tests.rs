//! Tests for pull request and status endpoints.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
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
async fn test_create_pull_request_returns_number() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/cfg/pulls"))
        .and(body_partial_json(json!({"head": "update-config", "base": "main"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"number": 512})))
        .mount(&server)
        .await;

    let client = rest_client(&server).await;
    let number = client
        .create_pull_request("octo", "cfg", "Update configuration", "update-config", "main", None)
        .await
        .unwrap();
    assert_eq!(number, 512);
}

#[tokio::test]
async fn test_get_ref_for_pull_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/cfg/pulls/512"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "number": 512,
            "head": {"ref": "update-config"}
        })))
        .mount(&server)
        .await;

    let client = rest_client(&server).await;
    let head = client.get_ref_for_pull_request("octo", "cfg", 512).await.unwrap();
    assert_eq!(head, "update-config");
}

#[tokio::test]
async fn test_update_ref_creates_missing_branch() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/repos/octo/cfg/git/refs/heads/update-config"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/cfg/git/refs"))
        .and(body_partial_json(json!({"ref": "refs/heads/update-config"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = rest_client(&server).await;
    client
        .update_ref("octo", "cfg", "update-config", "abc123")
        .await
        .unwrap();
}
