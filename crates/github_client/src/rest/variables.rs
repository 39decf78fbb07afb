//! Actions variables at organization, repository and environment scope.

use serde_json::Value;
use tracing::{debug, instrument};

use crate::errors::Error;
use crate::rest::RestClient;

#[cfg(test)]
#[path = "variables_tests.rs"]
mod tests;

impl RestClient {
    pub async fn get_org_variables(&self, org_id: &str) -> Result<Vec<Value>, Error> {
        let mut variables = self
            .get_paged_keyed(&format!("/orgs/{org_id}/actions/variables"), "variables")
            .await?;

        for variable in &mut variables {
            if variable.get("visibility").and_then(Value::as_str) == Some("selected") {
                let name = variable
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let repos = self
                    .get_paged_keyed(
                        &format!("/orgs/{org_id}/actions/variables/{name}/repositories"),
                        "repositories",
                    )
                    .await?;
                let names: Vec<Value> = repos
                    .iter()
                    .filter_map(|repo| repo.get("name").cloned())
                    .collect();
                if let Value::Object(map) = variable {
                    map.insert("selected_repositories".to_string(), Value::Array(names));
                }
            }
        }

        Ok(variables)
    }

    #[instrument(skip(self, data))]
    pub async fn add_org_variable(&self, org_id: &str, data: &Value) -> Result<(), Error> {
        self.post_empty(&format!("/orgs/{org_id}/actions/variables"), data)
            .await?;
        debug!(org_id, "added organization variable");
        Ok(())
    }

    #[instrument(skip(self, data))]
    pub async fn update_org_variable(
        &self,
        org_id: &str,
        variable_name: &str,
        data: &Value,
    ) -> Result<(), Error> {
        self.patch_empty(
            &format!("/orgs/{org_id}/actions/variables/{variable_name}"),
            data,
        )
        .await?;
        debug!(org_id, variable_name, "updated organization variable");
        Ok(())
    }

    pub async fn delete_org_variable(&self, org_id: &str, variable_name: &str) -> Result<(), Error> {
        self.delete(&format!("/orgs/{org_id}/actions/variables/{variable_name}"))
            .await?;
        Ok(())
    }

    pub async fn get_repo_variables(&self, org_id: &str, repo_name: &str) -> Result<Vec<Value>, Error> {
        self.get_paged_keyed(
            &format!("/repos/{org_id}/{repo_name}/actions/variables"),
            "variables",
        )
        .await
    }

    #[instrument(skip(self, data))]
    pub async fn add_repo_variable(
        &self,
        org_id: &str,
        repo_name: &str,
        data: &Value,
    ) -> Result<(), Error> {
        self.post_empty(&format!("/repos/{org_id}/{repo_name}/actions/variables"), data)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, data))]
    pub async fn update_repo_variable(
        &self,
        org_id: &str,
        repo_name: &str,
        variable_name: &str,
        data: &Value,
    ) -> Result<(), Error> {
        self.patch_empty(
            &format!("/repos/{org_id}/{repo_name}/actions/variables/{variable_name}"),
            data,
        )
        .await?;
        Ok(())
    }

    pub async fn delete_repo_variable(
        &self,
        org_id: &str,
        repo_name: &str,
        variable_name: &str,
    ) -> Result<(), Error> {
        self.delete(&format!(
            "/repos/{org_id}/{repo_name}/actions/variables/{variable_name}"
        ))
        .await?;
        Ok(())
    }

    pub async fn get_environment_variables(
        &self,
        org_id: &str,
        repo_name: &str,
        env_name: &str,
    ) -> Result<Vec<Value>, Error> {
        self.get_paged_keyed(
            &format!("/repos/{org_id}/{repo_name}/environments/{env_name}/variables"),
            "variables",
        )
        .await
    }

    #[instrument(skip(self, data))]
    pub async fn add_environment_variable(
        &self,
        org_id: &str,
        repo_name: &str,
        env_name: &str,
        data: &Value,
    ) -> Result<(), Error> {
        self.post_empty(
            &format!("/repos/{org_id}/{repo_name}/environments/{env_name}/variables"),
            data,
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, data))]
    pub async fn update_environment_variable(
        &self,
        org_id: &str,
        repo_name: &str,
        env_name: &str,
        variable_name: &str,
        data: &Value,
    ) -> Result<(), Error> {
        self.patch_empty(
            &format!(
                "/repos/{org_id}/{repo_name}/environments/{env_name}/variables/{variable_name}"
            ),
            data,
        )
        .await?;
        Ok(())
    }

    pub async fn delete_environment_variable(
        &self,
        org_id: &str,
        repo_name: &str,
        env_name: &str,
        variable_name: &str,
    ) -> Result<(), Error> {
        self.delete(&format!(
            "/repos/{org_id}/{repo_name}/environments/{env_name}/variables/{variable_name}"
        ))
        .await?;
        Ok(())
    }
}
