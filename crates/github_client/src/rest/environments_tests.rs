//! Tests for environment endpoints.

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
async fn test_custom_branch_policies_are_expanded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/api/environments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 2,
            "environments": [
                {
                    "id": 1,
                    "name": "production",
                    "deployment_branch_policy": {
                        "protected_branches": false,
                        "custom_branch_policies": true
                    }
                },
                {"id": 2, "name": "staging", "deployment_branch_policy": null}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/api/environments/production/deployment-branch-policies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 1,
            "branch_policies": [{"id": 5, "name": "release/*"}]
        })))
        .mount(&server)
        .await;

    let client = rest_client(&server).await;
    let environments = client.get_repo_environments("octo", "api").await.unwrap();

    assert_eq!(environments[0]["branch_policies"], json!(["release/*"]));
    assert!(environments[1].get("branch_policies").is_none());
}

#[tokio::test]
async fn test_update_environment_syncs_branch_policies() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/repos/octo/api/environments/production"))
        .and(body_partial_json(json!({"wait_timer": 30})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/api/environments/production/deployment-branch-policies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 1,
            "branch_policies": [{"id": 5, "name": "old/*"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/api/environments/production/deployment-branch-policies"))
        .and(body_partial_json(json!({"name": "release/*"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 6})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/repos/octo/api/environments/production/deployment-branch-policies/5"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = rest_client(&server).await;
    client
        .update_repo_environment(
            "octo",
            "api",
            "production",
            &json!({"wait_timer": 30, "branch_policies": ["release/*"]}),
        )
        .await
        .unwrap();
}
