//! Deployment environments.

use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

use crate::errors::Error;
use crate::rest::RestClient;

#[cfg(test)]
#[path = "environments_tests.rs"]
mod tests;

impl RestClient {
    /// Lists environments; environments with custom branch policies get
    /// the policy patterns merged in as `branch_policies`.
    pub async fn get_repo_environments(
        &self,
        org_id: &str,
        repo_name: &str,
    ) -> Result<Vec<Value>, Error> {
        let mut environments = self
            .get_paged_keyed(
                &format!("/repos/{org_id}/{repo_name}/environments"),
                "environments",
            )
            .await?;

        for environment in &mut environments {
            let custom_policies = environment
                .get("deployment_branch_policy")
                .and_then(|policy| policy.get("custom_branch_policies"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if !custom_policies {
                continue;
            }

            let env_name = environment
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let policies = self
                .get_paged_keyed(
                    &format!(
                        "/repos/{org_id}/{repo_name}/environments/{env_name}/deployment-branch-policies"
                    ),
                    "branch_policies",
                )
                .await?;
            let patterns: Vec<Value> = policies
                .iter()
                .filter_map(|policy| policy.get("name").cloned())
                .collect();
            if let Value::Object(map) = environment {
                map.insert("branch_policies".to_string(), Value::Array(patterns));
            }
        }

        Ok(environments)
    }

    /// Creates or updates an environment; branch policy patterns are
    /// synchronized through their own endpoint afterwards.
    #[instrument(skip(self, data))]
    pub async fn update_repo_environment(
        &self,
        org_id: &str,
        repo_name: &str,
        env_name: &str,
        data: &Value,
    ) -> Result<(), Error> {
        let mut body = match data {
            Value::Object(map) => map.clone(),
            other => {
                return Err(Error::InvalidResponse(format!(
                    "expected object for environment body, got {other}"
                )))
            }
        };
        let branch_policies = body.remove("branch_policies");
        body.remove("name");

        self.put_json(
            &format!("/repos/{org_id}/{repo_name}/environments/{env_name}"),
            &Value::Object(body),
        )
        .await?;

        if let Some(Value::Array(patterns)) = branch_policies {
            self.sync_branch_policies(org_id, repo_name, env_name, &patterns)
                .await?;
        }

        debug!(org_id, repo_name, env_name, "updated environment");
        Ok(())
    }

    async fn sync_branch_policies(
        &self,
        org_id: &str,
        repo_name: &str,
        env_name: &str,
        patterns: &[Value],
    ) -> Result<(), Error> {
        let route =
            format!("/repos/{org_id}/{repo_name}/environments/{env_name}/deployment-branch-policies");

        let current = self.get_paged_keyed(&route, "branch_policies").await?;
        let mut current_by_name: Map<String, Value> = Map::new();
        for policy in current {
            if let Some(name) = policy.get("name").and_then(Value::as_str) {
                current_by_name.insert(name.to_string(), policy.clone());
            }
        }

        for pattern in patterns {
            let Some(name) = pattern.as_str() else { continue };
            if current_by_name.remove(name).is_none() {
                self.post_empty(&route, &json!({ "name": name })).await?;
            }
        }

        for (_, policy) in current_by_name {
            if let Some(id) = policy.get("id").and_then(Value::as_i64) {
                self.delete(&format!("{route}/{id}")).await?;
            }
        }

        Ok(())
    }

    pub async fn delete_repo_environment(
        &self,
        org_id: &str,
        repo_name: &str,
        env_name: &str,
    ) -> Result<(), Error> {
        self.delete(&format!("/repos/{org_id}/{repo_name}/environments/{env_name}"))
            .await?;
        Ok(())
    }
}
