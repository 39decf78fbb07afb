//! Organization level settings, members, advisories and installations.

use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

use crate::errors::Error;
use crate::rest::RestClient;

#[cfg(test)]
#[path = "organization_tests.rs"]
mod tests;

impl RestClient {
    /// Fetches the organization settings exposed via the REST API.
    #[instrument(skip(self))]
    pub async fn get_org_settings(&self, org_id: &str) -> Result<Map<String, Value>, Error> {
        let response = self.get_json(&format!("/orgs/{org_id}")).await?;
        match response {
            Value::Object(map) => Ok(map),
            other => Err(Error::InvalidResponse(format!(
                "expected object for org settings, got {other}"
            ))),
        }
    }

    #[instrument(skip(self, settings))]
    pub async fn update_org_settings(
        &self,
        org_id: &str,
        settings: &Map<String, Value>,
    ) -> Result<(), Error> {
        self.patch_empty(&format!("/orgs/{org_id}"), &Value::Object(settings.clone()))
            .await?;
        debug!(org_id, "updated organization settings");
        Ok(())
    }

    /// Reads the merged actions/workflow configuration of an organization.
    ///
    /// The provider splits this over four endpoints; the result is a single
    /// flat object in provider field names.
    #[instrument(skip(self))]
    pub async fn get_org_workflow_settings(&self, org_id: &str) -> Result<Map<String, Value>, Error> {
        let base = format!("/orgs/{org_id}/actions/permissions");
        let mut merged = match self.get_json(&base).await? {
            Value::Object(map) => map,
            other => {
                return Err(Error::InvalidResponse(format!(
                    "expected object for actions permissions, got {other}"
                )))
            }
        };

        if merged.get("enabled_repositories").and_then(Value::as_str) == Some("selected") {
            let repos = self
                .get_paged_keyed(&format!("{base}/repositories"), "repositories")
                .await?;
            let names: Vec<Value> = repos
                .iter()
                .filter_map(|repo| repo.get("name").cloned())
                .collect();
            merged.insert("selected_repositories".to_string(), Value::Array(names));
        }

        if merged.get("allowed_actions").and_then(Value::as_str) == Some("selected") {
            if let Value::Object(selected) = self.get_json(&format!("{base}/selected-actions")).await? {
                merged.extend(selected);
            }
        }

        if let Value::Object(workflow) = self.get_json(&format!("{base}/workflow")).await? {
            merged.extend(workflow);
        }

        Ok(merged)
    }

    /// Writes the actions/workflow configuration, splitting the flat
    /// provider object back over the endpoints that accept each part.
    #[instrument(skip(self, settings))]
    pub async fn update_org_workflow_settings(
        &self,
        org_id: &str,
        settings: &Map<String, Value>,
    ) -> Result<(), Error> {
        let base = format!("/orgs/{org_id}/actions/permissions");

        let mut permissions = Map::new();
        for key in ["enabled_repositories", "allowed_actions"] {
            if let Some(value) = settings.get(key) {
                permissions.insert(key.to_string(), value.clone());
            }
        }
        if !permissions.is_empty() {
            self.put_json(&base, &Value::Object(permissions)).await?;
        }

        if let Some(ids) = settings.get("selected_repository_ids") {
            self.put_json(
                &format!("{base}/repositories"),
                &json!({ "selected_repository_ids": ids }),
            )
            .await?;
        }

        let mut selected_actions = Map::new();
        for key in ["github_owned_allowed", "verified_allowed", "patterns_allowed"] {
            if let Some(value) = settings.get(key) {
                selected_actions.insert(key.to_string(), value.clone());
            }
        }
        if !selected_actions.is_empty() {
            self.put_json(&format!("{base}/selected-actions"), &Value::Object(selected_actions))
                .await?;
        }

        let mut workflow = Map::new();
        for key in [
            "default_workflow_permissions",
            "can_approve_pull_request_reviews",
        ] {
            if let Some(value) = settings.get(key) {
                workflow.insert(key.to_string(), value.clone());
            }
        }
        if !workflow.is_empty() {
            self.put_json(&format!("{base}/workflow"), &Value::Object(workflow))
                .await?;
        }

        Ok(())
    }

    /// Lists organization members, optionally only those without 2FA.
    pub async fn list_members(
        &self,
        org_id: &str,
        two_factor_disabled: bool,
    ) -> Result<Vec<Value>, Error> {
        let route = if two_factor_disabled {
            format!("/orgs/{org_id}/members?filter=2fa_disabled")
        } else {
            format!("/orgs/{org_id}/members")
        };
        self.get_paged_array(&route).await
    }

    pub async fn list_security_advisories(
        &self,
        org_id: &str,
        state: Option<&str>,
    ) -> Result<Vec<Value>, Error> {
        let route = match state {
            Some(state) => format!("/orgs/{org_id}/security-advisories?state={state}"),
            None => format!("/orgs/{org_id}/security-advisories"),
        };
        self.get_paged_array(&route).await
    }

    pub async fn list_app_installations(&self, org_id: &str) -> Result<Vec<Value>, Error> {
        self.get_paged_keyed(&format!("/orgs/{org_id}/installations"), "installations")
            .await
    }
}
