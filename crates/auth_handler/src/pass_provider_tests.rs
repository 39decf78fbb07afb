//! Tests for the pass provider, driven through a stand-in executable.

use secrecy::ExposeSecret;
use serde_json::json;

use super::*;

// `echo` prints its arguments, so "pass show <entry>" yields "show <entry>"
// as the first output line, enough to observe the lookup path.
fn echo_provider() -> PassProvider {
    PassProvider::with_executable("echo".to_string())
}

#[tokio::test]
async fn test_secret_lookup_invokes_the_store() {
    let secret = echo_provider().get_secret("ci/github/token").await.unwrap();
    assert_eq!(secret, "show ci/github/token");
}

#[tokio::test]
async fn test_credentials_resolve_each_named_entry() {
    let data = json!({
        "api_token": "octo/token",
        "username": "octo/user"
    });

    let credentials = echo_provider()
        .get_credentials(data.as_object().unwrap())
        .await
        .unwrap();

    assert_eq!(credentials.github_token().expose_secret(), "show octo/token");
    assert_eq!(credentials.username(), Some("show octo/user"));
}

#[tokio::test]
async fn test_missing_store_entry_fails_resolution() {
    let provider = PassProvider::with_executable("false".to_string());
    let error = provider.get_secret("anything").await.unwrap_err();
    assert!(matches!(error, AuthError::ResolutionFailed(_)));
}

#[tokio::test]
async fn test_missing_token_entry_is_a_configuration_error() {
    let error = echo_provider()
        .get_credentials(json!({}).as_object().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(error, AuthError::InvalidConfiguration(_)));
}
