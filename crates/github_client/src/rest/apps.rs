//! App, user and token introspection queries.

use serde_json::Value;
use tracing::instrument;

use crate::errors::Error;
use crate::rest::RestClient;

#[cfg(test)]
#[path = "apps_tests.rs"]
mod tests;

impl RestClient {
    /// Resolves an app slug to `(id, node_id)`.
    pub async fn get_app_ids(&self, app_slug: &str) -> Result<(i64, String), Error> {
        let app = self.get_json(&format!("/apps/{app_slug}")).await?;
        let id = app
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::InvalidResponse(format!("app '{app_slug}' without id")))?;
        let node_id = app
            .get("node_id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidResponse(format!("app '{app_slug}' without node id")))?;
        Ok((id, node_id.to_string()))
    }

    /// Resolves a user login to `(id, node_id)`.
    pub async fn get_user_ids(&self, login: &str) -> Result<(i64, String), Error> {
        let user = self.get_json(&format!("/users/{login}")).await?;
        let id = user
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::InvalidResponse(format!("user '{login}' without id")))?;
        let node_id = user
            .get("node_id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidResponse(format!("user '{login}' without node id")))?;
        Ok((id, node_id.to_string()))
    }

    /// The OAuth scopes granted to the current token, from the
    /// `x-oauth-scopes` response header of any API call.
    #[instrument(skip(self))]
    pub async fn get_token_scopes(&self) -> Result<Vec<String>, Error> {
        let response = self
            .with_retry("/user", || self.octocrab()._get("/user"))
            .await?;

        let scopes = response
            .headers()
            .get("x-oauth-scopes")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        Ok(scopes
            .split(',')
            .map(str::trim)
            .filter(|scope| !scope.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn get_current_user(&self) -> Result<Value, Error> {
        self.get_json("/user").await
    }

    /// The rate limit snapshot, used by `check-status`.
    pub async fn get_rate_limit(&self) -> Result<Value, Error> {
        self.get_json("/rate_limit").await
    }
}
