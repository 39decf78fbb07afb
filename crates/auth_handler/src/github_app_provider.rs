//! Credentials minted from a GitHub App.
//!
//! The credential block carries the app id and private key; an
//! installation token is minted for the organization on every resolution,
//! so tokens stay short-lived.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tracing::info;

use crate::{AuthError, AuthResult, CredentialProvider, Credentials};

#[cfg(test)]
#[path = "github_app_provider_tests.rs"]
mod tests;

pub struct GitHubAppProvider;

#[async_trait]
impl CredentialProvider for GitHubAppProvider {
    async fn get_credentials(&self, data: &Map<String, Value>) -> AuthResult<Credentials> {
        let app_id = data
            .get("app_id")
            .and_then(Value::as_u64)
            .ok_or_else(|| AuthError::InvalidConfiguration("missing 'app_id' entry".to_string()))?;

        let private_key = match data.get("private_key").and_then(Value::as_str) {
            Some(key) if key.contains("PRIVATE KEY") => key.to_string(),
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                AuthError::InvalidConfiguration(format!("cannot read private key '{path}': {e}"))
            })?,
            None => {
                return Err(AuthError::InvalidConfiguration(
                    "missing 'private_key' entry".to_string(),
                ))
            }
        };

        // injected by the caller from the organization configuration
        let github_id = data
            .get("github_id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AuthError::InvalidConfiguration("missing 'github_id' for app authentication".to_string())
            })?;

        let token = mint_installation_token(app_id, &private_key, github_id).await?;
        Ok(Credentials::new(token, None, None, None))
    }

    async fn get_secret(&self, _key_path: &str) -> AuthResult<String> {
        Err(AuthError::ResolutionFailed(
            "the github_app provider cannot resolve secret references".to_string(),
        ))
    }
}

/// Finds the app installation on the organization and mints an access
/// token for it.
async fn mint_installation_token(
    app_id: u64,
    private_key: &str,
    github_id: &str,
) -> AuthResult<SecretString> {
    let client = github_client::create_app_client(app_id, private_key)
        .await
        .map_err(|e| AuthError::GitHubError(e.to_string()))?;

    let installations: Vec<Value> = client
        .get("/app/installations", None::<&()>)
        .await
        .map_err(|e| AuthError::GitHubError(format!("failed to list installations: {e}")))?;

    let installation_id = installations
        .iter()
        .find(|installation| {
            installation
                .pointer("/account/login")
                .and_then(Value::as_str)
                .is_some_and(|login| login.eq_ignore_ascii_case(github_id))
        })
        .and_then(|installation| installation.get("id").and_then(Value::as_u64))
        .ok_or_else(|| {
            AuthError::GitHubError(format!("app {app_id} is not installed on organization '{github_id}'"))
        })?;

    let (_, token) = client
        .installation_and_token(installation_id.into())
        .await
        .map_err(|e| AuthError::GitHubError(format!("failed to mint installation token: {e}")))?;

    info!(app_id, github_id, installation_id, "minted installation token");
    Ok(SecretString::from(token.expose_secret().to_string()))
}
