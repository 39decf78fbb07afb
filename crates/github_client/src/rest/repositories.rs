//! Repository CRUD and the settings endpoints GitHub scatters around it.

use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::errors::Error;
use crate::rest::RestClient;

#[cfg(test)]
#[path = "repositories_tests.rs"]
mod tests;

/// Repository fields that are not part of the main `/repos/{org}/{repo}`
/// resource but of satellite endpoints.
const SATELLITE_FIELDS: &[&str] = &[
    "topics",
    "dependabot_alerts_enabled",
    "dependabot_security_updates_enabled",
    "gh_pages_build_type",
    "gh_pages_source_branch",
    "gh_pages_source_path",
    "code_scanning_default_setup_enabled",
    "code_scanning_default_query_suite",
    "code_scanning_default_languages",
];

impl RestClient {
    /// Lists the names of all repositories of an organization.
    #[instrument(skip(self))]
    pub async fn get_repos(&self, org_id: &str) -> Result<Vec<String>, Error> {
        let repos = self
            .get_paged_array(&format!("/orgs/{org_id}/repos"))
            .await?;
        Ok(repos
            .iter()
            .filter_map(|repo| repo.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    /// Fetches a repository and merges in the state of its satellite
    /// endpoints (vulnerability alerts, security fixes, pages, default
    /// code scanning setup) so callers see one flat object.
    #[instrument(skip(self))]
    pub async fn get_repo_data(&self, org_id: &str, repo_name: &str) -> Result<Map<String, Value>, Error> {
        let mut data = match self.get_json(&format!("/repos/{org_id}/{repo_name}")).await? {
            Value::Object(map) => map,
            other => {
                return Err(Error::InvalidResponse(format!(
                    "expected object for repository, got {other}"
                )))
            }
        };

        let alerts = self
            .get_enabled_state(&format!("/repos/{org_id}/{repo_name}/vulnerability-alerts"))
            .await?;
        data.insert("dependabot_alerts_enabled".to_string(), Value::Bool(alerts));

        match self
            .get_json(&format!("/repos/{org_id}/{repo_name}/automated-security-fixes"))
            .await
        {
            Ok(fixes) => {
                if let Some(enabled) = fixes.get("enabled") {
                    data.insert(
                        "dependabot_security_updates_enabled".to_string(),
                        enabled.clone(),
                    );
                }
            }
            Err(Error::NotFound) => {}
            Err(e) => return Err(e),
        }

        match self.get_json(&format!("/repos/{org_id}/{repo_name}/pages")).await {
            Ok(pages) => {
                data.insert("gh_pages".to_string(), pages);
            }
            Err(Error::NotFound) => {}
            Err(e) => return Err(e),
        }

        match self
            .get_json(&format!("/repos/{org_id}/{repo_name}/code-scanning/default-setup"))
            .await
        {
            Ok(setup) => {
                data.insert("code_scanning_default_setup".to_string(), setup);
            }
            // default setup is not available for every plan / language mix
            Err(Error::NotFound) => {}
            Err(Error::Api { .. }) => {}
            Err(e) => return Err(e),
        }

        Ok(data)
    }

    /// Applies a provider-shaped update, routing satellite fields to their
    /// own endpoints and everything else to a single PATCH.
    #[instrument(skip(self, data))]
    pub async fn update_repo(
        &self,
        org_id: &str,
        repo_name: &str,
        data: &Map<String, Value>,
    ) -> Result<(), Error> {
        let mut plain = Map::new();
        for (key, value) in data {
            if !SATELLITE_FIELDS.contains(&key.as_str()) && key != "gh_pages" && key != "code_scanning_default_setup" {
                plain.insert(key.clone(), value.clone());
            }
        }
        if !plain.is_empty() {
            self.patch_empty(&format!("/repos/{org_id}/{repo_name}"), &Value::Object(plain))
                .await?;
        }

        // the repo may have been renamed by the PATCH above
        let repo_name = data
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(repo_name);

        if let Some(topics) = data.get("topics") {
            self.put_json(
                &format!("/repos/{org_id}/{repo_name}/topics"),
                &json!({ "names": topics }),
            )
            .await?;
        }

        if let Some(enabled) = data.get("dependabot_alerts_enabled").and_then(Value::as_bool) {
            let route = format!("/repos/{org_id}/{repo_name}/vulnerability-alerts");
            if enabled {
                self.put_no_body(&route).await?;
            } else {
                self.delete(&route).await?;
            }
        }

        if let Some(enabled) = data
            .get("dependabot_security_updates_enabled")
            .and_then(Value::as_bool)
        {
            let route = format!("/repos/{org_id}/{repo_name}/automated-security-fixes");
            if enabled {
                self.put_no_body(&route).await?;
            } else {
                self.delete(&route).await?;
            }
        }

        if let Some(pages) = data.get("gh_pages") {
            self.update_gh_pages(org_id, repo_name, pages).await?;
        }

        if let Some(setup) = data.get("code_scanning_default_setup") {
            self.patch_empty(
                &format!("/repos/{org_id}/{repo_name}/code-scanning/default-setup"),
                setup,
            )
            .await?;
        }

        debug!(org_id, repo_name, "updated repository");
        Ok(())
    }

    async fn update_gh_pages(&self, org_id: &str, repo_name: &str, pages: &Value) -> Result<(), Error> {
        let route = format!("/repos/{org_id}/{repo_name}/pages");

        if pages.get("build_type").and_then(Value::as_str) == Some("disabled") {
            match self.delete(&route).await {
                Ok(()) | Err(Error::NotFound) => return Ok(()),
                Err(e) => return Err(e),
            }
        }

        // a site must be created with POST before it can be updated
        match self.put_json(&route, pages).await {
            Ok(()) => Ok(()),
            Err(Error::NotFound) => self.post_empty(&route, pages).await,
            Err(e) => Err(e),
        }
    }

    /// Creates a repository, either plain or generated from a template
    /// repository, then applies the remaining settings.
    #[instrument(skip(self, data))]
    pub async fn add_repo(
        &self,
        org_id: &str,
        data: &Map<String, Value>,
        template_repository: Option<&str>,
        post_process_template_content: &[String],
        auto_init: bool,
    ) -> Result<(), Error> {
        let repo_name = data
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidResponse("repository data without a name".to_string()))?
            .to_string();

        match template_repository {
            Some(template) => {
                info!(org_id, repo_name, template, "creating repository from template");
                let body = json!({
                    "owner": org_id,
                    "name": repo_name,
                    "private": data.get("private").and_then(Value::as_bool).unwrap_or(false),
                    "include_all_branches": false,
                });
                self.post_empty(&format!("/repos/{template}/generate"), &body)
                    .await?;

                // template generation only knows about name and visibility,
                // the rest is applied as a regular update.
                let mut remaining = data.clone();
                remaining.remove("name");
                remaining.remove("private");
                if !remaining.is_empty() {
                    self.update_repo(org_id, &repo_name, &remaining).await?;
                }

                let template_owner_repo = template.to_string();
                for path in post_process_template_content {
                    self.post_process_content(org_id, &repo_name, &template_owner_repo, path)
                        .await?;
                }
            }
            None => {
                info!(org_id, repo_name, "creating repository");
                let mut body = data.clone();
                body.insert("auto_init".to_string(), Value::Bool(auto_init));
                self.post_empty(&format!("/orgs/{org_id}/repos"), &Value::Object(body))
                    .await?;
            }
        }

        Ok(())
    }

    /// Rewrites references to the template repository in a freshly
    /// generated file, e.g. badges in a README.
    async fn post_process_content(
        &self,
        org_id: &str,
        repo_name: &str,
        template: &str,
        path: &str,
    ) -> Result<(), Error> {
        let content = match self.get_content(org_id, repo_name, path, None).await {
            Ok(content) => content,
            Err(Error::NotFound) => {
                warn!(path, "post-process path not present in generated repository");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let template_name = template.split('/').next_back().unwrap_or(template);
        let updated = content
            .replace(template, &format!("{org_id}/{repo_name}"))
            .replace(template_name, repo_name);

        if updated != content {
            self.update_content(org_id, repo_name, path, &updated, Some("post-process template content"))
                .await?;
        }
        Ok(())
    }

    /// Reads the merged actions configuration of a repository.
    #[instrument(skip(self))]
    pub async fn get_repo_workflow_settings(
        &self,
        org_id: &str,
        repo_name: &str,
    ) -> Result<Map<String, Value>, Error> {
        let base = format!("/repos/{org_id}/{repo_name}/actions/permissions");
        let mut merged = match self.get_json(&base).await? {
            Value::Object(map) => map,
            other => {
                return Err(Error::InvalidResponse(format!(
                    "expected object for actions permissions, got {other}"
                )))
            }
        };

        if merged.get("enabled").and_then(Value::as_bool) == Some(true) {
            if merged.get("allowed_actions").and_then(Value::as_str) == Some("selected") {
                if let Value::Object(selected) =
                    self.get_json(&format!("{base}/selected-actions")).await?
                {
                    merged.extend(selected);
                }
            }
            if let Value::Object(workflow) = self.get_json(&format!("{base}/workflow")).await? {
                merged.extend(workflow);
            }
        }

        Ok(merged)
    }

    /// Writes the actions configuration of a repository, splitting the
    /// flat object over the endpoints that accept each part.
    #[instrument(skip(self, settings))]
    pub async fn update_repo_workflow_settings(
        &self,
        org_id: &str,
        repo_name: &str,
        settings: &Map<String, Value>,
    ) -> Result<(), Error> {
        let base = format!("/repos/{org_id}/{repo_name}/actions/permissions");

        let mut permissions = Map::new();
        for key in ["enabled", "allowed_actions"] {
            if let Some(value) = settings.get(key) {
                permissions.insert(key.to_string(), value.clone());
            }
        }
        if !permissions.is_empty() {
            self.put_json(&base, &Value::Object(permissions)).await?;
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

    pub async fn delete_repo(&self, org_id: &str, repo_name: &str) -> Result<(), Error> {
        self.delete(&format!("/repos/{org_id}/{repo_name}")).await?;
        debug!(org_id, repo_name, "deleted repository");
        Ok(())
    }

    /// Resolves repository names to their numeric ids.
    pub async fn get_repo_ids(&self, org_id: &str, repo_names: &[String]) -> Result<Vec<i64>, Error> {
        let mut ids = Vec::with_capacity(repo_names.len());
        for repo_name in repo_names {
            let data = self.get_repo_data(org_id, repo_name).await?;
            let id = data
                .get("id")
                .and_then(Value::as_i64)
                .ok_or_else(|| Error::InvalidResponse(format!("repository '{repo_name}' without id")))?;
            ids.push(id);
        }
        Ok(ids)
    }

    pub async fn get_repo_node_id(&self, org_id: &str, repo_name: &str) -> Result<String, Error> {
        let data = self.get_json(&format!("/repos/{org_id}/{repo_name}")).await?;
        data.get("node_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidResponse(format!("repository '{repo_name}' without node id")))
    }
}
