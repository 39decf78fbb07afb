//! Actions secrets at organization, repository and environment scope.
//!
//! Writes accept the provider-shaped body produced by the mapping layer
//! with a plaintext `value`; the value is sealed against the public key of
//! the target scope before anything leaves the process.

use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

use crate::encryption::{seal_secret_value, SecretPublicKey};
use crate::errors::Error;
use crate::rest::RestClient;

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod tests;

/// Replaces the plaintext `value` entry with `encrypted_value`/`key_id`.
fn sealed_body(data: &Value, public_key: &SecretPublicKey) -> Result<Map<String, Value>, Error> {
    let mut body = match data {
        Value::Object(map) => map.clone(),
        other => {
            return Err(Error::InvalidResponse(format!(
                "expected object for secret body, got {other}"
            )))
        }
    };

    if let Some(value) = body.remove("value") {
        let plaintext = value.as_str().ok_or_else(|| {
            Error::InvalidResponse("secret value must be a string".to_string())
        })?;
        body.insert(
            "encrypted_value".to_string(),
            Value::String(seal_secret_value(&public_key.key, plaintext)?),
        );
        body.insert("key_id".to_string(), Value::String(public_key.key_id.clone()));
    }

    Ok(body)
}

impl RestClient {
    pub async fn get_org_secrets(&self, org_id: &str) -> Result<Vec<Value>, Error> {
        let mut secrets = self
            .get_paged_keyed(&format!("/orgs/{org_id}/actions/secrets"), "secrets")
            .await?;

        for secret in &mut secrets {
            if secret.get("visibility").and_then(Value::as_str) == Some("selected") {
                let name = secret
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let repos = self
                    .get_paged_keyed(
                        &format!("/orgs/{org_id}/actions/secrets/{name}/repositories"),
                        "repositories",
                    )
                    .await?;
                let names: Vec<Value> = repos
                    .iter()
                    .filter_map(|repo| repo.get("name").cloned())
                    .collect();
                if let Value::Object(map) = secret {
                    map.insert("selected_repositories".to_string(), Value::Array(names));
                }
            }
        }

        Ok(secrets)
    }

    async fn get_org_public_key(&self, org_id: &str) -> Result<SecretPublicKey, Error> {
        let value = self
            .get_json(&format!("/orgs/{org_id}/actions/secrets/public-key"))
            .await?;
        serde_json::from_value(value).map_err(Error::Deserialization)
    }

    /// Creates or updates an organization secret; 201 and 204 are both
    /// treated as success by the upsert PUT.
    #[instrument(skip(self, data))]
    pub async fn update_org_secret(
        &self,
        org_id: &str,
        secret_name: &str,
        data: &Value,
    ) -> Result<(), Error> {
        let public_key = self.get_org_public_key(org_id).await?;
        let mut body = sealed_body(data, &public_key)?;
        body.remove("name");

        self.put_json(
            &format!("/orgs/{org_id}/actions/secrets/{secret_name}"),
            &Value::Object(body),
        )
        .await?;
        debug!(org_id, secret_name, "updated organization secret");
        Ok(())
    }

    pub async fn delete_org_secret(&self, org_id: &str, secret_name: &str) -> Result<(), Error> {
        self.delete(&format!("/orgs/{org_id}/actions/secrets/{secret_name}"))
            .await?;
        debug!(org_id, secret_name, "deleted organization secret");
        Ok(())
    }

    pub async fn get_repo_secrets(&self, org_id: &str, repo_name: &str) -> Result<Vec<Value>, Error> {
        self.get_paged_keyed(
            &format!("/repos/{org_id}/{repo_name}/actions/secrets"),
            "secrets",
        )
        .await
    }

    async fn get_repo_public_key(&self, org_id: &str, repo_name: &str) -> Result<SecretPublicKey, Error> {
        let value = self
            .get_json(&format!("/repos/{org_id}/{repo_name}/actions/secrets/public-key"))
            .await?;
        serde_json::from_value(value).map_err(Error::Deserialization)
    }

    #[instrument(skip(self, data))]
    pub async fn update_repo_secret(
        &self,
        org_id: &str,
        repo_name: &str,
        secret_name: &str,
        data: &Value,
    ) -> Result<(), Error> {
        let public_key = self.get_repo_public_key(org_id, repo_name).await?;
        let mut body = sealed_body(data, &public_key)?;
        body.remove("name");

        self.put_json(
            &format!("/repos/{org_id}/{repo_name}/actions/secrets/{secret_name}"),
            &Value::Object(body),
        )
        .await?;
        debug!(org_id, repo_name, secret_name, "updated repository secret");
        Ok(())
    }

    pub async fn delete_repo_secret(
        &self,
        org_id: &str,
        repo_name: &str,
        secret_name: &str,
    ) -> Result<(), Error> {
        self.delete(&format!(
            "/repos/{org_id}/{repo_name}/actions/secrets/{secret_name}"
        ))
        .await?;
        debug!(org_id, repo_name, secret_name, "deleted repository secret");
        Ok(())
    }

    pub async fn get_environment_secrets(
        &self,
        org_id: &str,
        repo_name: &str,
        env_name: &str,
    ) -> Result<Vec<Value>, Error> {
        self.get_paged_keyed(
            &format!("/repos/{org_id}/{repo_name}/environments/{env_name}/secrets"),
            "secrets",
        )
        .await
    }

    async fn get_environment_public_key(
        &self,
        org_id: &str,
        repo_name: &str,
        env_name: &str,
    ) -> Result<SecretPublicKey, Error> {
        let value = self
            .get_json(&format!(
                "/repos/{org_id}/{repo_name}/environments/{env_name}/secrets/public-key"
            ))
            .await?;
        serde_json::from_value(value).map_err(Error::Deserialization)
    }

    #[instrument(skip(self, data))]
    pub async fn update_environment_secret(
        &self,
        org_id: &str,
        repo_name: &str,
        env_name: &str,
        secret_name: &str,
        data: &Value,
    ) -> Result<(), Error> {
        let public_key = self
            .get_environment_public_key(org_id, repo_name, env_name)
            .await?;
        let mut body = sealed_body(data, &public_key)?;
        body.remove("name");

        self.put_json(
            &format!("/repos/{org_id}/{repo_name}/environments/{env_name}/secrets/{secret_name}"),
            &Value::Object(body),
        )
        .await?;
        debug!(org_id, repo_name, env_name, secret_name, "updated environment secret");
        Ok(())
    }

    pub async fn delete_environment_secret(
        &self,
        org_id: &str,
        repo_name: &str,
        env_name: &str,
        secret_name: &str,
    ) -> Result<(), Error> {
        self.delete(&format!(
            "/repos/{org_id}/{repo_name}/environments/{env_name}/secrets/{secret_name}"
        ))
        .await?;
        Ok(())
    }

    /// Resolves selected repository names in an org secret/variable body to
    /// the `selected_repository_ids` form the provider expects.
    pub async fn resolve_selected_repositories(
        &self,
        org_id: &str,
        body: &mut Map<String, Value>,
    ) -> Result<(), Error> {
        if let Some(names) = body.remove("selected_repositories") {
            let names: Vec<String> = names
                .as_array()
                .map(|values| {
                    values
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            let ids = self.get_repo_ids(org_id, &names).await?;
            body.insert("selected_repository_ids".to_string(), json!(ids));
        }
        Ok(())
    }
}
