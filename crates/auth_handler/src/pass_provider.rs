//! Credentials from a `pass` password store.
//!
//! The credential block names store entries, not values; everything is
//! looked up with `pass show` at resolution time.

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Map, Value};
use tracing::debug;

use crate::{AuthError, AuthResult, CredentialProvider, Credentials};

#[cfg(test)]
#[path = "pass_provider_tests.rs"]
mod tests;

pub struct PassProvider {
    executable: String,
}

impl Default for PassProvider {
    fn default() -> Self {
        Self {
            executable: "pass".to_string(),
        }
    }
}

impl PassProvider {
    #[cfg(test)]
    pub(crate) fn with_executable(executable: String) -> Self {
        Self { executable }
    }

    /// Runs `pass show <entry>` and returns the first line of its output.
    async fn show(&self, entry: &str) -> AuthResult<String> {
        debug!(entry, "looking up pass entry");

        let output = tokio::process::Command::new(&self.executable)
            .arg("show")
            .arg(entry)
            .output()
            .await
            .map_err(|e| AuthError::ResolutionFailed(format!("failed to run pass: {e}")))?;

        if !output.status.success() {
            return Err(AuthError::ResolutionFailed(format!(
                "pass entry '{entry}' could not be read: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|_| AuthError::ResolutionFailed(format!("pass entry '{entry}' is not UTF-8")))?;

        match stdout.lines().next() {
            Some(line) if !line.is_empty() => Ok(line.to_string()),
            _ => Err(AuthError::ResolutionFailed(format!("pass entry '{entry}' is empty"))),
        }
    }

    async fn show_optional(&self, data: &Map<String, Value>, key: &str) -> AuthResult<Option<String>> {
        match data.get(key).and_then(Value::as_str) {
            Some(entry) => Ok(Some(self.show(entry).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl CredentialProvider for PassProvider {
    async fn get_credentials(&self, data: &Map<String, Value>) -> AuthResult<Credentials> {
        let token_entry = data
            .get("api_token")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::InvalidConfiguration("missing 'api_token' entry".to_string()))?;

        let github_token = SecretString::from(self.show(token_entry).await?);

        Ok(Credentials::new(
            github_token,
            self.show_optional(data, "username").await?,
            self.show_optional(data, "password")
                .await?
                .map(SecretString::from),
            self.show_optional(data, "twofa_seed")
                .await?
                .map(SecretString::from),
        ))
    }

    async fn get_secret(&self, key_path: &str) -> AuthResult<String> {
        self.show(key_path).await
    }
}
