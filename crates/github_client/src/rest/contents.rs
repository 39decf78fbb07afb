//! Repository content access and template synchronization.

use base64::Engine;
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::errors::Error;
use crate::rest::RestClient;

#[cfg(test)]
#[path = "contents_tests.rs"]
mod tests;

impl RestClient {
    /// Fetches a file and returns its decoded UTF-8 content.
    #[instrument(skip(self))]
    pub async fn get_content(
        &self,
        org_id: &str,
        repo_name: &str,
        path: &str,
        r#ref: Option<&str>,
    ) -> Result<String, Error> {
        let route = match r#ref {
            Some(r#ref) => format!("/repos/{org_id}/{repo_name}/contents/{path}?ref={ref}"),
            None => format!("/repos/{org_id}/{repo_name}/contents/{path}"),
        };

        let response = self.get_json(&route).await?;
        let encoded = response
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidResponse(format!("no content for path '{path}'")))?;

        let cleaned = encoded.replace('\n', "");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(cleaned)
            .map_err(|e| Error::InvalidResponse(format!("invalid base64 content: {e}")))?;

        String::from_utf8(decoded)
            .map_err(|_| Error::InvalidResponse(format!("content of '{path}' is not UTF-8")))
    }

    async fn get_content_sha(
        &self,
        org_id: &str,
        repo_name: &str,
        path: &str,
    ) -> Result<Option<String>, Error> {
        match self
            .get_json(&format!("/repos/{org_id}/{repo_name}/contents/{path}"))
            .await
        {
            Ok(response) => Ok(response
                .get("sha")
                .and_then(Value::as_str)
                .map(str::to_string)),
            Err(Error::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Creates or updates a file; returns whether anything was written.
    #[instrument(skip(self, content, message))]
    pub async fn update_content(
        &self,
        org_id: &str,
        repo_name: &str,
        path: &str,
        content: &str,
        message: Option<&str>,
    ) -> Result<bool, Error> {
        if let Ok(existing) = self.get_content(org_id, repo_name, path, None).await {
            if existing == content {
                debug!(path, "content unchanged, skipping update");
                return Ok(false);
            }
        }

        let sha = self.get_content_sha(org_id, repo_name, path).await?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(content);
        let message = message.unwrap_or("Update file");

        let mut body = json!({
            "message": message,
            "content": encoded,
        });
        if let Some(sha) = sha {
            body["sha"] = Value::String(sha);
        }

        self.put_json(&format!("/repos/{org_id}/{repo_name}/contents/{path}"), &body)
            .await?;
        info!(org_id, repo_name, path, "updated content");
        Ok(true)
    }

    /// Deletes a file; returns false when the file did not exist.
    #[instrument(skip(self, message))]
    pub async fn delete_content(
        &self,
        org_id: &str,
        repo_name: &str,
        path: &str,
        message: Option<&str>,
    ) -> Result<bool, Error> {
        let Some(sha) = self.get_content_sha(org_id, repo_name, path).await? else {
            return Ok(false);
        };

        let message = message.unwrap_or("Delete file");
        let route = format!(
            "/repos/{org_id}/{repo_name}/contents/{path}?message={message}&sha={sha}"
        );
        self.with_retry(&route, || {
            self.octocrab()
                .delete::<Option<Value>, _, _>(&route, None::<&()>)
        })
        .await?;
        info!(org_id, repo_name, path, "deleted content");
        Ok(true)
    }

    /// Copies files from a template repository into a target repository,
    /// restricted to `template_paths` when given. Returns the paths that
    /// were actually updated.
    #[instrument(skip(self))]
    pub async fn sync_from_template_repository(
        &self,
        org_id: &str,
        repo_name: &str,
        template_repository: &str,
        template_paths: Option<&[String]>,
    ) -> Result<Vec<String>, Error> {
        let template_data = self.get_json(&format!("/repos/{template_repository}")).await?;
        let default_branch = template_data
            .get("default_branch")
            .and_then(Value::as_str)
            .unwrap_or("main");

        let tree = self
            .get_json(&format!(
                "/repos/{template_repository}/git/trees/{default_branch}?recursive=1"
            ))
            .await?;
        let entries = tree
            .get("tree")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::InvalidResponse("template tree without entries".to_string()))?;

        let mut updated = Vec::new();
        for entry in entries {
            if entry.get("type").and_then(Value::as_str) != Some("blob") {
                continue;
            }
            let Some(path) = entry.get("path").and_then(Value::as_str) else {
                continue;
            };
            if let Some(paths) = template_paths {
                if !paths.iter().any(|wanted| wanted == path) {
                    continue;
                }
            }

            let (template_org, template_repo) = template_repository
                .split_once('/')
                .ok_or_else(|| {
                    Error::InvalidResponse(format!(
                        "invalid template repository '{template_repository}'"
                    ))
                })?;
            let content = self
                .get_content(template_org, template_repo, path, Some(default_branch))
                .await?;

            if self
                .update_content(org_id, repo_name, path, &content, Some("Sync from template"))
                .await?
            {
                updated.push(path.to_string());
            }
        }

        info!(
            org_id,
            repo_name,
            count = updated.len(),
            "synced files from template repository"
        );
        Ok(updated)
    }
}
