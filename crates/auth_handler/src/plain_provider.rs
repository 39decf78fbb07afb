//! Credentials stored inline in the configuration file.
//!
//! Meant for CI use where the configuration is generated from a vault at
//! runtime; interactive setups should prefer the `pass` provider.

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Map, Value};

use crate::{AuthError, AuthResult, CredentialProvider, Credentials};

#[cfg(test)]
#[path = "plain_provider_tests.rs"]
mod tests;

pub struct PlainProvider;

fn required(data: &Map<String, Value>, key: &str) -> AuthResult<String> {
    data.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AuthError::InvalidConfiguration(format!("missing '{key}' entry")))
}

fn optional(data: &Map<String, Value>, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

#[async_trait]
impl CredentialProvider for PlainProvider {
    async fn get_credentials(&self, data: &Map<String, Value>) -> AuthResult<Credentials> {
        let github_token = SecretString::from(required(data, "api_token")?);

        Ok(Credentials::new(
            github_token,
            optional(data, "username"),
            optional(data, "password").map(SecretString::from),
            optional(data, "twofa_seed").map(SecretString::from),
        ))
    }

    async fn get_secret(&self, key_path: &str) -> AuthResult<String> {
        // an inline "secret" is its own value
        Ok(key_path.to_string())
    }
}
