//! Credential resolution for GitHub organizations.
//!
//! Every organization in the top-level configuration names a credential
//! provider. A provider turns the organization's credential block into
//! [`Credentials`] (a GitHub token, optionally a web-UI login) and resolves
//! opaque secret references of the form `<provider>:<key-path>` to
//! plaintext. Resolution happens as late as possible so that plan output
//! never carries resolved secrets.

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Map, Value};

mod github_app_provider;
mod pass_provider;
mod plain_provider;
mod totp;

pub use github_app_provider::GitHubAppProvider;
pub use pass_provider::PassProvider;
pub use plain_provider::PlainProvider;
pub use totp::TotpGenerator;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Result type for credential operations
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while resolving credentials or secrets
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credential configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unknown credential provider '{0}'")]
    UnknownProvider(String),

    #[error("Invalid secret reference '{0}', expected '<provider>:<key-path>'")]
    InvalidSecretReference(String),

    #[error("Failed to resolve secret: {0}")]
    ResolutionFailed(String),

    #[error("GitHub authentication failed: {0}")]
    GitHubError(String),
}

/// Credentials to access GitHub, resolved from a credential provider.
///
/// The token authenticates REST and GraphQL calls; username, password and
/// TOTP seed are only present when web-UI operations are configured.
pub struct Credentials {
    username: Option<String>,
    password: Option<SecretString>,
    github_token: SecretString,
    totp_secret: Option<SecretString>,
}

impl Credentials {
    pub fn new(
        github_token: SecretString,
        username: Option<String>,
        password: Option<SecretString>,
        totp_secret: Option<SecretString>,
    ) -> Self {
        Self {
            username,
            password,
            github_token,
            totp_secret,
        }
    }

    pub fn github_token(&self) -> &SecretString {
        &self.github_token
    }

    /// The token as an owned string, for export into the environment of
    /// evaluator subprocesses (`GH_TOKEN`). Do not log or persist it.
    pub fn github_token_value(&self) -> String {
        use secrecy::ExposeSecret;
        self.github_token.expose_secret().to_string()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Web-UI credentials, when a username and password are configured.
    ///
    /// TOTP codes are generated on demand from the seed at the moment a
    /// login form is submitted, never ahead of time.
    pub fn web_credentials(&self) -> Option<github_client::WebCredentials> {
        let username = self.username.clone()?;
        let password = self.password.clone()?;

        let otp_source: Option<std::sync::Arc<dyn github_client::OtpSource>> = self
            .totp_secret
            .clone()
            .map(|seed| std::sync::Arc::new(TotpGenerator::new(seed)) as _);

        Some(github_client::WebCredentials {
            username,
            password,
            otp_source,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// A backend that produces credentials and resolves secret references.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Builds credentials from an organization's credential block.
    async fn get_credentials(&self, data: &Map<String, Value>) -> AuthResult<Credentials>;

    /// Resolves a key path to a plaintext secret.
    async fn get_secret(&self, key_path: &str) -> AuthResult<String>;
}

/// Looks up a credential provider by its configured name.
pub fn provider_by_name(name: &str) -> AuthResult<Box<dyn CredentialProvider>> {
    match name {
        "plain" | "inline" => Ok(Box::new(PlainProvider)),
        "pass" => Ok(Box::new(PassProvider::default())),
        "github_app" => Ok(Box::new(GitHubAppProvider)),
        other => Err(AuthError::UnknownProvider(other.to_string())),
    }
}

/// Splits a secret reference `<provider>:<key-path>` into its parts.
pub fn parse_secret_reference(reference: &str) -> AuthResult<(&str, &str)> {
    match reference.split_once(':') {
        Some((provider, key_path)) if !provider.is_empty() && !key_path.is_empty() => {
            Ok((provider, key_path))
        }
        _ => Err(AuthError::InvalidSecretReference(reference.to_string())),
    }
}

/// Resolves a `<provider>:<key-path>` reference to plaintext.
pub async fn resolve_secret(reference: &str) -> AuthResult<String> {
    let (provider_name, key_path) = parse_secret_reference(reference)?;
    let provider = provider_by_name(provider_name)?;
    provider.get_secret(key_path).await
}
